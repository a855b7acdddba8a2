// File: ./src/fetch/redirect.rs
//! Redirect-following tower layer plus the URI reference resolution it
//! shares with the page parsers.
use http::{Method, Request, Response, StatusCode, Uri};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;
use url::Url;

/// Resolves `reference` against `base` per RFC 3986 (dot segments
/// included). Fragments are discarded.
pub fn resolve_url(base: &str, reference: &str) -> Option<String> {
    let base = Url::parse(base.trim()).ok()?;
    let mut joined = base.join(reference.trim()).ok()?;
    joined.set_fragment(None);
    Some(joined.into())
}

/// [`resolve_url`] for a request URI, as needed by a `Location` header.
pub fn resolve_reference(base: &Uri, reference: &str) -> Option<Uri> {
    resolve_url(&base.to_string(), reference)?.parse().ok()
}

#[derive(Clone, Debug)]
pub struct FollowRedirectLayer {
    max_redirects: usize,
}

impl FollowRedirectLayer {
    pub fn new(max_redirects: usize) -> Self {
        Self { max_redirects }
    }
}

impl<S> Layer<S> for FollowRedirectLayer {
    type Service = FollowRedirectService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        FollowRedirectService {
            inner,
            max_redirects: self.max_redirects,
        }
    }
}

#[derive(Clone, Debug)]
pub struct FollowRedirectService<S> {
    inner: S,
    max_redirects: usize,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for FollowRedirectService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: std::error::Error + Send + Sync + 'static,
    ReqBody: Clone + Default + Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let mut inner = self.inner.clone();
        let max_redirects = self.max_redirects;

        Box::pin(async move {
            let mut current = req;
            let mut hops = 0;

            loop {
                let template = current.clone();
                let response = inner.call(current).await?;

                if hops >= max_redirects || !response.status().is_redirection() {
                    return Ok(response);
                }
                let Some(target) = response
                    .headers()
                    .get(http::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|loc| resolve_reference(template.uri(), loc))
                else {
                    return Ok(response);
                };

                log::debug!("Following redirect {} -> {}", template.uri(), target);
                current = template;
                // 303 always switches to a bodiless GET
                if response.status() == StatusCode::SEE_OTHER {
                    *current.method_mut() = Method::GET;
                    *current.body_mut() = ReqBody::default();
                }
                *current.uri_mut() = target;
                hops += 1;
            }
        })
    }
}
