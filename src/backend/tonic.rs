//! tonic backend
//!
//! Generates, per service, a `<service>_client` module with a `tonic` client
//! and a `<service>_server` module with an `#[async_trait]` trait whose
//! methods all default to `Status::unimplemented`, plus a server wrapper
//! that routes each RPC path to its trait method and can be mounted on a
//! `tonic` server. Files with services also get the shared
//! [`BOX_RESPONSE_STREAM`] alias used by server-streaming methods. Output is
//! nested in the package namespace.

use super::{Backend, MethodShape, ResolvedMethod, ServiceInput};
use crate::codegen::{parse_type, Declaration, DeclarationKind, FileContext};
use crate::names::{self, RPC_ALIAS};
use crate::options::Options;
use crate::resolver::ServiceModules;
use crate::GeneratorError;
use heck::ToUpperCamelCase;
use proc_macro2::{Ident, TokenStream};
use prost_types::FileDescriptorProto;
use quote::{format_ident, quote};

/// Style name of the full backend
pub const STYLE: &str = "tonic";

/// Style name of the client-only backend
pub const CLIENT_STYLE: &str = "tonic-client";

/// Shared server-streaming response type
pub const BOX_RESPONSE_STREAM: &str = "BoxResponseStream";

const RESERVED: &[&str] = &[BOX_RESPONSE_STREAM];

/// Client and server generation for `tonic`
#[derive(Debug, Default, Clone, Copy)]
pub struct TonicBackend;

impl Backend for TonicBackend {
    fn name(&self) -> &'static str {
        STYLE
    }

    fn reserved_idents(&self) -> &'static [&'static str] {
        RESERVED
    }

    fn service_modules(&self) -> ServiceModules {
        ServiceModules {
            client: true,
            server: true,
        }
    }

    fn service_client(
        &self,
        ctx: &FileContext<'_>,
        service: &ServiceInput<'_>,
        options: &Options,
    ) -> Result<Option<Declaration>, GeneratorError> {
        client(ctx, service, options).map(Some)
    }

    fn unimplemented_server(
        &self,
        ctx: &FileContext<'_>,
        service: &ServiceInput<'_>,
    ) -> Result<Option<Declaration>, GeneratorError> {
        server(ctx, service).map(Some)
    }

    fn shared_interface_types(
        &self,
        ctx: &FileContext<'_>,
    ) -> Result<Option<Vec<Declaration>>, GeneratorError> {
        shared_types(ctx).map(Some)
    }

    fn wraps_output_in_namespace(&self, _file: &FileDescriptorProto) -> Option<bool> {
        Some(true)
    }
}

/// The tonic backend without server skeletons
#[derive(Debug, Default, Clone, Copy)]
pub struct TonicClientBackend {
    inner: TonicBackend,
}

impl Backend for TonicClientBackend {
    fn name(&self) -> &'static str {
        CLIENT_STYLE
    }

    fn reserved_idents(&self) -> &'static [&'static str] {
        self.inner.reserved_idents()
    }

    fn service_modules(&self) -> ServiceModules {
        ServiceModules {
            client: true,
            server: false,
        }
    }

    fn service_client(
        &self,
        ctx: &FileContext<'_>,
        service: &ServiceInput<'_>,
        options: &Options,
    ) -> Result<Option<Declaration>, GeneratorError> {
        self.inner.service_client(ctx, service, options)
    }

    fn shared_interface_types(
        &self,
        ctx: &FileContext<'_>,
    ) -> Result<Option<Vec<Declaration>>, GeneratorError> {
        self.inner.shared_interface_types(ctx)
    }

    fn wraps_output_in_namespace(&self, file: &FileDescriptorProto) -> Option<bool> {
        self.inner.wraps_output_in_namespace(file)
    }
}

/// Location of a module generated at the file root
fn module_location(ctx: &FileContext<'_>, module: &str) -> Vec<String> {
    let mut location = ctx.namespace.clone();
    location.push(module.to_string());
    location
}

/// Lint allowances and the `grpc_1` import shared by generated modules
fn module_prelude(ctx: &FileContext<'_>, location: &[String]) -> Result<TokenStream, GeneratorError> {
    let rpc = ctx.rpc_path(location, "")?;
    Ok(quote! {
        #![allow(
            unused_variables,
            dead_code,
            missing_docs,
            clippy::wildcard_imports,
            clippy::let_unit_value
        )]
        use #rpc;
        use #rpc::codegen::*;
    })
}

fn client(
    ctx: &FileContext<'_>,
    service: &ServiceInput<'_>,
    options: &Options,
) -> Result<Declaration, GeneratorError> {
    let location = module_location(ctx, &service.names.client_module);
    let methods = service.methods(ctx, &location)?;
    let full_name = service.full_name(ctx);
    let rpc = format_ident!("{}", RPC_ALIAS);

    let module = names::ident(&service.names.client_module);
    let client = format_ident!("{}Client", service.names.ident.trim_start_matches("r#"));
    let prelude = module_prelude(ctx, &location)?;
    let docs = ctx.comments.doc_attrs(service.source_path);
    let methods = methods
        .iter()
        .map(|method| client_method(ctx, &full_name, method))
        .collect::<Vec<_>>();

    let connect = if options.transport {
        quote! {
            impl #client<#rpc::transport::Channel> {
                /// Attempt to create a new client by connecting to a given endpoint.
                pub async fn connect<D>(dst: D) -> Result<Self, #rpc::transport::Error>
                where
                    D: TryInto<#rpc::transport::Endpoint>,
                    D::Error: Into<StdError>,
                {
                    let conn = #rpc::transport::Endpoint::new(dst)?.connect().await?;
                    Ok(Self::new(conn))
                }
            }
        }
    } else {
        TokenStream::new()
    };

    let tokens = quote! {
        /// Generated client implementations.
        pub mod #module {
            #prelude
            use #rpc::codegen::http::Uri;

            #docs
            #[derive(Debug, Clone)]
            pub struct #client<T> {
                inner: #rpc::client::Grpc<T>,
            }

            #connect

            impl<T> #client<T>
            where
                T: #rpc::client::GrpcService<#rpc::body::BoxBody>,
                T::Error: Into<StdError>,
                T::ResponseBody: Body<Data = Bytes> + std::marker::Send + 'static,
                <T::ResponseBody as Body>::Error: Into<StdError> + std::marker::Send,
            {
                pub fn new(inner: T) -> Self {
                    let inner = #rpc::client::Grpc::new(inner);
                    Self { inner }
                }

                pub fn with_origin(inner: T, origin: Uri) -> Self {
                    let inner = #rpc::client::Grpc::with_origin(inner, origin);
                    Self { inner }
                }

                /// Limits the maximum size of a decoded message.
                ///
                /// Default: `4MB`
                #[must_use]
                pub fn max_decoding_message_size(mut self, limit: usize) -> Self {
                    self.inner = self.inner.max_decoding_message_size(limit);
                    self
                }

                /// Limits the maximum size of an encoded message.
                ///
                /// Default: `usize::MAX`
                #[must_use]
                pub fn max_encoding_message_size(mut self, limit: usize) -> Self {
                    self.inner = self.inner.max_encoding_message_size(limit);
                    self
                }

                #(#methods)*
            }
        }
    };

    Ok(Declaration {
        name: service.names.client_module.clone(),
        kind: DeclarationKind::Client,
        tokens,
    })
}

fn client_method(ctx: &FileContext<'_>, service: &str, method: &ResolvedMethod<'_>) -> TokenStream {
    let rpc = format_ident!("{}", RPC_ALIAS);
    let ident = names::ident(&method.ident);
    let docs = ctx.comments.doc_attrs(&method.source_path);
    let input = &method.input;
    let output = &method.output;
    let proto_method = method.descriptor.name();
    let path = format!("/{}/{}", service, proto_method);

    let request = if method.shape.client_streaming() {
        quote!(impl #rpc::IntoStreamingRequest<Message = #input>)
    } else {
        quote!(impl #rpc::IntoRequest<#input>)
    };
    let into_request = if method.shape.client_streaming() {
        quote!(request.into_streaming_request())
    } else {
        quote!(request.into_request())
    };
    let response = if method.shape.server_streaming() {
        quote!(#rpc::codec::Streaming<#output>)
    } else {
        quote!(#output)
    };
    let call = match method.shape {
        MethodShape::Unary => quote!(unary),
        MethodShape::ServerStreaming => quote!(server_streaming),
        MethodShape::ClientStreaming => quote!(client_streaming),
        MethodShape::Streaming => quote!(streaming),
    };

    quote! {
        #docs
        pub async fn #ident(
            &mut self,
            request: #request,
        ) -> std::result::Result<#rpc::Response<#response>, #rpc::Status> {
            self.inner
                .ready()
                .await
                .map_err(|e| {
                    #rpc::Status::unknown(format!("Service was not ready: {}", e.into()))
                })?;
            let codec = #rpc::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static(#path);
            let mut req = #into_request;
            req.extensions_mut().insert(GrpcMethod::new(#service, #proto_method));
            self.inner.#call(req, path, codec).await
        }
    }
}

fn server(ctx: &FileContext<'_>, service: &ServiceInput<'_>) -> Result<Declaration, GeneratorError> {
    let location = module_location(ctx, &service.names.server_module);
    let methods = service.methods(ctx, &location)?;
    let full_name = service.full_name(ctx);
    let rpc = format_ident!("{}", RPC_ALIAS);

    let module = names::ident(&service.names.server_module);
    let service_trait = names::ident(&service.names.ident);
    let server = format_ident!("{}Server", service.names.ident.trim_start_matches("r#"));
    let prelude = module_prelude(ctx, &location)?;
    let docs = ctx.comments.doc_attrs(service.source_path);
    let stream = parse_type(&format!("super::{}", BOX_RESPONSE_STREAM))?;
    let trait_doc = format!(
        " Generated trait containing gRPC methods that should be implemented for use with {}.",
        server
    );

    let slots = methods.iter().map(|method| {
        let ident = names::ident(&method.ident);
        let docs = ctx.comments.doc_attrs(&method.source_path);
        let input = &method.input;
        let output = &method.output;
        let request = if method.shape.client_streaming() {
            quote!(#rpc::Request<#rpc::Streaming<#input>>)
        } else {
            quote!(#rpc::Request<#input>)
        };
        let response = if method.shape.server_streaming() {
            quote!(#stream<#output>)
        } else {
            quote!(#output)
        };
        quote! {
            #docs
            async fn #ident(
                &self,
                request: #request,
            ) -> std::result::Result<#rpc::Response<#response>, #rpc::Status> {
                Err(#rpc::Status::unimplemented("Not yet implemented"))
            }
        }
    });

    let routes = methods
        .iter()
        .map(|method| route(&full_name, &service_trait, &stream, method));

    let tokens = quote! {
        /// Generated server implementations.
        pub mod #module {
            #prelude

            #[doc = #trait_doc]
            #docs
            #[#rpc::async_trait]
            pub trait #service_trait: std::marker::Send + std::marker::Sync + 'static {
                #(#slots)*
            }

            #[derive(Debug)]
            pub struct #server<T> {
                inner: Arc<T>,
                accept_compression_encodings: EnabledCompressionEncodings,
                send_compression_encodings: EnabledCompressionEncodings,
                max_decoding_message_size: Option<usize>,
                max_encoding_message_size: Option<usize>,
            }

            impl<T> #server<T> {
                pub fn new(inner: T) -> Self {
                    Self::from_arc(Arc::new(inner))
                }

                pub fn from_arc(inner: Arc<T>) -> Self {
                    Self {
                        inner,
                        accept_compression_encodings: Default::default(),
                        send_compression_encodings: Default::default(),
                        max_decoding_message_size: None,
                        max_encoding_message_size: None,
                    }
                }

                pub fn inner(&self) -> &Arc<T> {
                    &self.inner
                }

                pub fn with_interceptor<F>(inner: T, interceptor: F) -> InterceptedService<Self, F>
                where
                    F: #rpc::service::Interceptor,
                {
                    InterceptedService::new(Self::new(inner), interceptor)
                }

                /// Enable decompressing requests with the given encoding.
                #[must_use]
                pub fn accept_compressed(mut self, encoding: CompressionEncoding) -> Self {
                    self.accept_compression_encodings.enable(encoding);
                    self
                }

                /// Compress responses with the given encoding, if the client supports it.
                #[must_use]
                pub fn send_compressed(mut self, encoding: CompressionEncoding) -> Self {
                    self.send_compression_encodings.enable(encoding);
                    self
                }

                /// Limits the maximum size of a decoded message.
                ///
                /// Default: `4MB`
                #[must_use]
                pub fn max_decoding_message_size(mut self, limit: usize) -> Self {
                    self.max_decoding_message_size = Some(limit);
                    self
                }

                /// Limits the maximum size of an encoded message.
                ///
                /// Default: `usize::MAX`
                #[must_use]
                pub fn max_encoding_message_size(mut self, limit: usize) -> Self {
                    self.max_encoding_message_size = Some(limit);
                    self
                }
            }

            impl<T, B> #rpc::codegen::Service<http::Request<B>> for #server<T>
            where
                T: #service_trait,
                B: #rpc::codegen::Body + std::marker::Send + 'static,
                B::Error: Into<StdError> + std::marker::Send + 'static,
            {
                type Response = http::Response<#rpc::body::BoxBody>;
                type Error = std::convert::Infallible;
                type Future = BoxFuture<Self::Response, Self::Error>;

                fn poll_ready(
                    &mut self,
                    _cx: &mut Context<'_>,
                ) -> Poll<std::result::Result<(), Self::Error>> {
                    Poll::Ready(Ok(()))
                }

                fn call(&mut self, req: http::Request<B>) -> Self::Future {
                    match req.uri().path() {
                        #(#routes)*
                        _ => Box::pin(async move {
                            let mut response = http::Response::new(empty_body());
                            let headers = response.headers_mut();
                            headers.insert(
                                #rpc::Status::GRPC_STATUS,
                                (#rpc::Code::Unimplemented as i32).into(),
                            );
                            headers.insert(
                                http::header::CONTENT_TYPE,
                                #rpc::metadata::GRPC_CONTENT_TYPE,
                            );
                            Ok(response)
                        }),
                    }
                }
            }

            impl<T> Clone for #server<T> {
                fn clone(&self) -> Self {
                    Self {
                        inner: self.inner.clone(),
                        accept_compression_encodings: self.accept_compression_encodings,
                        send_compression_encodings: self.send_compression_encodings,
                        max_decoding_message_size: self.max_decoding_message_size,
                        max_encoding_message_size: self.max_encoding_message_size,
                    }
                }
            }

            /// Generated gRPC service name
            pub const SERVICE_NAME: &str = #full_name;

            impl<T> #rpc::server::NamedService for #server<T> {
                const NAME: &'static str = SERVICE_NAME;
            }
        }
    };

    Ok(Declaration {
        name: service.names.server_module.clone(),
        kind: DeclarationKind::Server,
        tokens,
    })
}

/// Match arm dispatching one RPC path to its trait method
fn route(
    service: &str,
    service_trait: &Ident,
    stream: &syn::Type,
    method: &ResolvedMethod<'_>,
) -> TokenStream {
    let rpc = format_ident!("{}", RPC_ALIAS);
    let path = format!("/{}/{}", service, method.descriptor.name());
    let ident = names::ident(&method.ident);
    let svc = format_ident!(
        "{}Svc",
        method.ident.trim_start_matches("r#").to_upper_camel_case()
    );
    let input = &method.input;
    let output = &method.output;

    let (handler, request, response_stream, future_output, call) = match method.shape {
        MethodShape::Unary => (
            quote!(UnaryService),
            quote!(#rpc::Request<#input>),
            TokenStream::new(),
            quote!(Self::Response),
            quote!(unary),
        ),
        MethodShape::ServerStreaming => (
            quote!(ServerStreamingService),
            quote!(#rpc::Request<#input>),
            quote!(type ResponseStream = #stream<#output>;),
            quote!(Self::ResponseStream),
            quote!(server_streaming),
        ),
        MethodShape::ClientStreaming => (
            quote!(ClientStreamingService),
            quote!(#rpc::Request<#rpc::Streaming<#input>>),
            TokenStream::new(),
            quote!(Self::Response),
            quote!(client_streaming),
        ),
        MethodShape::Streaming => (
            quote!(StreamingService),
            quote!(#rpc::Request<#rpc::Streaming<#input>>),
            quote!(type ResponseStream = #stream<#output>;),
            quote!(Self::ResponseStream),
            quote!(streaming),
        ),
    };

    quote! {
        #path => {
            #[allow(non_camel_case_types)]
            struct #svc<T: #service_trait>(pub Arc<T>);

            impl<T: #service_trait> #rpc::server::#handler<#input> for #svc<T> {
                type Response = #output;
                #response_stream
                type Future = BoxFuture<#rpc::Response<#future_output>, #rpc::Status>;

                fn call(&mut self, request: #request) -> Self::Future {
                    let inner = Arc::clone(&self.0);
                    let fut = async move { <T as #service_trait>::#ident(&inner, request).await };
                    Box::pin(fut)
                }
            }

            let accept_compression_encodings = self.accept_compression_encodings;
            let send_compression_encodings = self.send_compression_encodings;
            let max_decoding_message_size = self.max_decoding_message_size;
            let max_encoding_message_size = self.max_encoding_message_size;
            let inner = self.inner.clone();
            let fut = async move {
                let method = #svc(inner);
                let codec = #rpc::codec::ProstCodec::default();
                let mut grpc = #rpc::server::Grpc::new(codec)
                    .apply_compression_config(
                        accept_compression_encodings,
                        send_compression_encodings,
                    )
                    .apply_max_message_size_config(
                        max_decoding_message_size,
                        max_encoding_message_size,
                    );
                let res = grpc.#call(method, req).await;
                Ok(res)
            };
            Box::pin(fut)
        }
    }
}

fn shared_types(ctx: &FileContext<'_>) -> Result<Vec<Declaration>, GeneratorError> {
    let ident = format_ident!("{}", BOX_RESPONSE_STREAM);
    let stream = ctx.rpc_path(&ctx.namespace, "codegen::tokio_stream::Stream")?;
    let status = ctx.rpc_path(&ctx.namespace, "Status")?;

    Ok(vec![Declaration {
        name: BOX_RESPONSE_STREAM.to_string(),
        kind: DeclarationKind::Shared,
        tokens: quote! {
            /// Response stream returned by server-streaming methods
            pub type #ident<T> = ::std::pin::Pin<
                Box<dyn #stream<Item = ::core::result::Result<T, #status>> + ::core::marker::Send + 'static>,
            >;
        },
    }])
}
