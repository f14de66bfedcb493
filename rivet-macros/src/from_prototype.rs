use proc_macro::TokenStream;
use quote::quote;
use syn::{token::{Brace, Paren}, *};

macro_rules! error {
    ($($tt:tt)*) => {
        return Err(syn::Error::new(proc_macro::Span::call_site().into(), format!($($tt)*)))
    };
}

pub fn from_prototype(input: DeriveInput) -> Result<TokenStream> {
    let DeriveInput { attrs, vis: _, ident, generics, data } = input;
    let Data::Struct(data) = data else {
        error!("only struct are currently supported")
    };

    let mut type_name = ident.to_string();
    for attr in attrs.iter().filter(|e|e.path().is_ident("prototype")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                type_name = meta.value()?.parse::<LitStr>()?.value();
                Ok(())
            } else {
                Err(meta.error("expected `name`"))
            }
        })?;
    }

    let mut output = quote! {};

    match data.fields {
        Fields::Unnamed(FieldsUnnamed { unnamed, .. }) => {
            let body = unnamed.iter().map(|_|quote! { reader.read()?, });
            Paren::default().surround(&mut output, |e|e.extend(body));
        },
        Fields::Named(FieldsNamed { named, .. }) => {
            let body = named
                .into_iter()
                .filter_map(|e|e.ident)
                .map(|id|quote! { #id: reader.read()?, });
            Brace::default().surround(&mut output, |e|e.extend(body));
        }
        Fields::Unit => {}
    };

    let (g1, g2, g3) = generics.split_for_impl();

    Ok(quote! {
        impl #g1 ::rivet::FromPrototype for #ident #g2 #g3 {
            const TYPE_NAME: &'static str = #type_name;

            #[allow(unused_mut, unused_variables)]
            fn from_prototype(prototype: &::rivet::Prototype) -> ::rivet::Result<Self> {
                let mut reader = prototype.reader();
                Ok(Self #output)
            }
        }

        impl #g1 ::rivet::FromValue for #ident #g2 #g3 {
            fn from_value(value: &::rivet::TypedValue) -> ::rivet::Result<Self> {
                match value.as_prototype()? {
                    Some(prototype) => ::rivet::FromPrototype::from_prototype(&prototype),
                    None => Err(::rivet::error::ErrorKind::ValueIllegal(
                        concat!("unexpected NULL for `", stringify!(#ident), "`").into(),
                    ).into()),
                }
            }
        }
    }.into())
}
