use proc_macro::TokenStream;
use quote::quote;
use syn::{token::{Brace, Paren}, *};

macro_rules! error {
    ($($tt:tt)*) => {
        return Err(syn::Error::new(proc_macro::Span::call_site().into(), format!($($tt)*)))
    };
}

pub fn from_row(input: DeriveInput) -> Result<TokenStream> {
    let DeriveInput { attrs: _, vis: _, ident, generics, data } = input;
    let Data::Struct(data) = data else {
        error!("only struct are currently supported")
    };

    let mut output = quote! {};

    match data.fields {
        Fields::Unnamed(FieldsUnnamed { unnamed, .. }) => {
            let body = (0..unnamed.len())
                .map(|i|quote! { row.try_get(#i)?, });
            Paren::default().surround(&mut output, |e|e.extend(body));
        },
        Fields::Named(FieldsNamed { named, .. }) => {
            let body = named
                .into_iter()
                .filter_map(|e|e.ident)
                .map(|id|(id.to_string(),id))
                .map(|(name,id)|quote! { #id: row.try_get(#name)?, });
            Brace::default().surround(&mut output, |e|e.extend(body));
        }
        Fields::Unit => {}
    };

    let (g1, g2, g3) = generics.split_for_impl();

    Ok(quote! {
        impl #g1 ::rivet::FromRow for #ident #g2 #g3 {
            fn from_row(row: ::rivet::Row) -> ::rivet::Result<Self> {
                Ok(Self #output)
            }
        }
    }.into())
}
