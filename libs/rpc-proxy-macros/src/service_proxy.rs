use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::parse::Parser;
use syn::{
    FnArg, GenericArgument, Ident, ItemTrait, LitStr, Pat, PathArguments, ReturnType, TraitItem,
    TraitItemFn, Type, TypeParamBound, parse_quote,
};

#[derive(Default)]
struct ProxyArgs {
    namespace: Option<LitStr>,
    name: Option<Ident>,
}

fn parse_args(attr: TokenStream) -> syn::Result<ProxyArgs> {
    let mut args = ProxyArgs::default();
    let parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("namespace") {
            if args.namespace.is_some() {
                return Err(meta.error("duplicate argument 'namespace'"));
            }
            let lit: LitStr = meta.value()?.parse()?;
            if lit.value().is_empty() {
                return Err(syn::Error::new_spanned(&lit, "namespace must not be empty"));
            }
            args.namespace = Some(lit);
            Ok(())
        } else if meta.path.is_ident("name") {
            if args.name.is_some() {
                return Err(meta.error("duplicate argument 'name'"));
            }
            let lit: LitStr = meta.value()?.parse()?;
            args.name = Some(lit.parse::<Ident>()?);
            Ok(())
        } else {
            Err(meta.error("unknown service_proxy argument; expected one of: namespace, name"))
        }
    });
    parser.parse2(attr)?;
    Ok(args)
}

/// One proxied trait method, validated.
struct ProxyMethod {
    item: TraitItemFn,
    params: Vec<Ident>,
    /// `T` of `Result<T, E>`.
    ok_ty: Type,
    returns_unit: bool,
}

pub fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    match try_expand(attr, item) {
        Ok(tokens) => tokens,
        Err(err) => err.to_compile_error(),
    }
}

fn try_expand(attr: TokenStream, item: TokenStream) -> syn::Result<TokenStream> {
    let args = parse_args(attr)?;
    let mut service = syn::parse2::<ItemTrait>(item)?;

    if !service.generics.params.is_empty() || service.generics.where_clause.is_some() {
        return Err(syn::Error::new_spanned(
            &service.generics,
            "generic service traits cannot be proxied",
        ));
    }

    let methods = service
        .items
        .iter()
        .map(|item| match item {
            TraitItem::Fn(method) => parse_method(method),
            other => Err(syn::Error::new_spanned(
                other,
                "service traits may only contain methods",
            )),
        })
        .collect::<syn::Result<Vec<_>>>()?;

    ensure_thread_safe(&mut service);
    ensure_async_trait(&mut service);

    let trait_ident = &service.ident;
    let vis = &service.vis;
    let adapter = args
        .name
        .unwrap_or_else(|| format_ident!("{}Proxy", trait_ident));
    let interface_name = trait_ident.to_string();
    let adapter_name = adapter.to_string();
    let namespace = match &args.namespace {
        Some(lit) => quote! { #lit },
        None => quote! { ::core::module_path!() },
    };

    let service_ids: Vec<TokenStream> = methods
        .iter()
        .map(|m| service_id(&namespace, &interface_name, m))
        .collect();

    let descriptors = methods.iter().zip(&service_ids).map(|(m, sid)| {
        let name = m.item.sig.ident.to_string();
        let params = m.params.iter().map(ToString::to_string);
        let ok_ty = &m.ok_ty;
        let returns_unit = m.returns_unit;
        quote! {
            ::rpc_proxy::MethodDescriptor {
                name: #name,
                service_id: #sid,
                parameters: &[#(#params),*],
                return_type: ::core::stringify!(#ok_ty),
                returns_unit: #returns_unit,
            }
        }
    });

    let wrappers = methods
        .iter()
        .zip(&service_ids)
        .map(|(m, sid)| wrapper(m, sid));

    let doc = format!("Remote proxy for [`{interface_name}`].");

    Ok(quote! {
        #service

        #[doc = #doc]
        #[derive(Debug, Clone)]
        #vis struct #adapter {
            base: ::rpc_proxy::ProxyBase,
        }

        impl #adapter {
            pub const METHODS: &'static [::rpc_proxy::MethodDescriptor] = &[#(#descriptors),*];

            pub const DEFINITION: ::rpc_proxy::InterfaceDefinition =
                ::rpc_proxy::InterfaceDefinition {
                    namespace: #namespace,
                    interface: #interface_name,
                    adapter: #adapter_name,
                    methods: Self::METHODS,
                    interface_key: ::rpc_proxy::TypeKey::of::<dyn #trait_ident>,
                    construct: Self::construct_erased,
                };

            /// Build the adapter around a fresh engine.
            ///
            /// # Errors
            /// Returns `ProxyError::MissingDependency` if the container lacks a resolver.
            pub fn new(
                remote_invoker: ::std::sync::Arc<dyn ::rpc_proxy::RemoteInvoker>,
                type_converter: ::std::sync::Arc<dyn ::rpc_proxy::TypeConvertibleService>,
                service_key: ::core::option::Option<::std::string::String>,
                container: ::std::sync::Arc<::rpc_proxy::ServiceContainer>,
            ) -> ::core::result::Result<Self, ::rpc_proxy::ProxyError> {
                ::rpc_proxy::ProxyBase::new(remote_invoker, type_converter, service_key, container)
                    .map(Self::from_base)
            }

            #[must_use]
            pub fn from_base(base: ::rpc_proxy::ProxyBase) -> Self {
                Self { base }
            }

            #[must_use]
            pub fn base(&self) -> &::rpc_proxy::ProxyBase {
                &self.base
            }

            fn construct_erased(
                base: ::rpc_proxy::ProxyBase,
            ) -> ::std::sync::Arc<
                dyn ::core::any::Any + ::core::marker::Send + ::core::marker::Sync,
            > {
                let proxy: ::std::sync::Arc<dyn #trait_ident> =
                    ::std::sync::Arc::new(Self::from_base(base));
                ::std::sync::Arc::new(proxy)
            }
        }

        #[::rpc_proxy::__private::async_trait::async_trait]
        impl #trait_ident for #adapter {
            #(#wrappers)*
        }

        ::rpc_proxy::__private::inventory::submit! {
            #adapter::DEFINITION
        }
    })
}

fn parse_method(method: &TraitItemFn) -> syn::Result<ProxyMethod> {
    let sig = &method.sig;

    if sig.asyncness.is_none() {
        return Err(syn::Error::new_spanned(
            sig,
            "service proxy methods must be `async`; place #[service_proxy] above #[async_trait]",
        ));
    }
    if !sig.generics.params.is_empty() || sig.generics.where_clause.is_some() {
        return Err(syn::Error::new_spanned(
            &sig.generics,
            "generic methods cannot be proxied",
        ));
    }
    if let Some(variadic) = &sig.variadic {
        return Err(syn::Error::new_spanned(variadic, "variadic methods cannot be proxied"));
    }

    let mut inputs = sig.inputs.iter();
    let shared_receiver = matches!(
        inputs.next(),
        Some(FnArg::Receiver(receiver))
            if receiver.reference.is_some() && receiver.mutability.is_none()
    );
    if !shared_receiver {
        return Err(syn::Error::new_spanned(
            &sig.ident,
            "service proxy methods must take `&self`",
        ));
    }

    let mut params = Vec::new();
    for input in inputs {
        let FnArg::Typed(typed) = input else {
            return Err(syn::Error::new_spanned(input, "unexpected receiver"));
        };
        let Pat::Ident(pat) = typed.pat.as_ref() else {
            return Err(syn::Error::new_spanned(
                &typed.pat,
                "proxied arguments must be plain identifiers",
            ));
        };
        if pat.by_ref.is_some() || pat.mutability.is_some() || pat.subpat.is_some() {
            return Err(syn::Error::new_spanned(
                pat,
                "proxied arguments must be plain identifiers",
            ));
        }
        if matches!(typed.ty.as_ref(), Type::ImplTrait(_)) {
            return Err(syn::Error::new_spanned(
                &typed.ty,
                "`impl Trait` arguments cannot be proxied",
            ));
        }
        params.push(pat.ident.clone());
    }

    let ok_ty = match &sig.output {
        ReturnType::Type(_, ty) => result_ok_type(ty),
        ReturnType::Default => None,
    }
    .ok_or_else(|| {
        syn::Error::new_spanned(
            &sig.output,
            "service proxy methods must return `Result<T, E>` with `E: From<ProxyError>`",
        )
    })?;
    let returns_unit = matches!(&ok_ty, Type::Tuple(tuple) if tuple.elems.is_empty());

    Ok(ProxyMethod {
        item: method.clone(),
        params,
        ok_ty,
        returns_unit,
    })
}

/// `T` of `Result<T, E>` or of any `...Result<T>` alias.
fn result_ok_type(ty: &Type) -> Option<Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    if path.qself.is_some() {
        return None;
    }
    let last = path.path.segments.last()?;
    if !last.ident.to_string().ends_with("Result") {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &last.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(ok) => Some(ok.clone()),
        _ => None,
    }
}

/// `concat!(namespace, ".", Interface, ".", method, "_", param, ...)`.
fn service_id(namespace: &TokenStream, interface: &str, method: &ProxyMethod) -> TokenStream {
    let name = method.item.sig.ident.to_string();
    let params = method.params.iter().map(ToString::to_string);
    quote! {
        ::core::concat!(#namespace, ".", #interface, ".", #name #(, "_", #params)*)
    }
}

fn wrapper(method: &ProxyMethod, service_id: &TokenStream) -> TokenStream {
    let sig = &method.item.sig;
    let params = &method.params;
    let names = params.iter().map(ToString::to_string);

    let parameters = if params.is_empty() {
        quote! { let __rpc_parameters = ::rpc_proxy::Parameters::new(); }
    } else {
        quote! {
            let mut __rpc_parameters = ::rpc_proxy::Parameters::new();
            #( __rpc_parameters.insert(#names, &#params)?; )*
        }
    };

    let call = if method.returns_unit {
        quote! {
            self.base.invoke_void(__rpc_parameters, #service_id).await?;
            ::core::result::Result::Ok(())
        }
    } else {
        let ok_ty = &method.ok_ty;
        quote! {
            let __rpc_result = self.base.invoke::<#ok_ty>(__rpc_parameters, #service_id).await?;
            ::core::result::Result::Ok(__rpc_result)
        }
    };

    quote! {
        #sig {
            #parameters
            #call
        }
    }
}

fn ensure_thread_safe(service: &mut ItemTrait) {
    let has = |name: &str| {
        service.supertraits.iter().any(|bound| match bound {
            TypeParamBound::Trait(t) => t.path.segments.last().is_some_and(|s| s.ident == name),
            _ => false,
        })
    };
    let (has_send, has_sync) = (has("Send"), has("Sync"));

    if !has_send {
        service.supertraits.push(parse_quote!(::core::marker::Send));
    }
    if !has_sync {
        service.supertraits.push(parse_quote!(::core::marker::Sync));
    }
    if service.colon_token.is_none() && !service.supertraits.is_empty() {
        service.colon_token = Some(<syn::Token![:]>::default());
    }
}

fn ensure_async_trait(service: &mut ItemTrait) {
    let present = service.attrs.iter().any(|attr| {
        attr.path()
            .segments
            .last()
            .is_some_and(|s| s.ident == "async_trait")
    });
    if !present {
        service
            .attrs
            .push(parse_quote!(#[::rpc_proxy::__private::async_trait::async_trait]));
    }
}
