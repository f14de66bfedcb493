use proc_macro::TokenStream;
use syn::DeriveInput;

mod from_row;
mod from_prototype;

/// Derive `FromRow`.
///
/// Named fields are read by case insensitive column name, tuple fields
/// by column index.
#[proc_macro_derive(FromRow)]
pub fn from_row(input: TokenStream) -> TokenStream {
    match from_row::from_row(syn::parse_macro_input!(input as DeriveInput)) {
        Ok(ok) => ok,
        Err(err) => err.into_compile_error().into(),
    }
}

/// Derive `FromPrototype` and `FromValue`.
///
/// Fields are read in declaration order. The structured type name
/// defaults to the struct name, override with
/// `#[prototype(name = "...")]`.
#[proc_macro_derive(FromPrototype, attributes(prototype))]
pub fn from_prototype(input: TokenStream) -> TokenStream {
    match from_prototype::from_prototype(syn::parse_macro_input!(input as DeriveInput)) {
        Ok(ok) => ok,
        Err(err) => err.into_compile_error().into(),
    }
}
