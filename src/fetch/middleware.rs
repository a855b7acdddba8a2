// File: ./src/fetch/middleware.rs
//! Tower middleware stamping every outgoing request with the configured
//! User-Agent and a permissive Accept header.
use http::header::{ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use http::{HeaderValue, Request};
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

const DEFAULT_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,application/json;q=0.9,text/calendar;q=0.9,*/*;q=0.8";

#[derive(Clone, Debug)]
pub struct UserAgentLayer {
    user_agent: String,
}

impl UserAgentLayer {
    pub fn new(user_agent: &str) -> Self {
        Self {
            user_agent: user_agent.to_string(),
        }
    }
}

impl<S> Layer<S> for UserAgentLayer {
    type Service = UserAgentService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        UserAgentService {
            inner,
            user_agent: HeaderValue::from_str(&self.user_agent).ok(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct UserAgentService<S> {
    inner: S,
    user_agent: Option<HeaderValue>,
}

impl<S, ReqBody> Service<Request<ReqBody>> for UserAgentService<S>
where
    S: Service<Request<ReqBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let headers = req.headers_mut();
        if let Some(ua) = &self.user_agent {
            headers.insert(USER_AGENT, ua.clone());
        }
        if !headers.contains_key(ACCEPT) {
            headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
        }
        if !headers.contains_key(ACCEPT_LANGUAGE) {
            headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        }
        self.inner.call(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::future::{Ready, ready};

    #[derive(Clone)]
    struct Echo;

    impl Service<Request<String>> for Echo {
        type Response = Request<String>;
        type Error = Infallible;
        type Future = Ready<Result<Self::Response, Self::Error>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: Request<String>) -> Self::Future {
            ready(Ok(req))
        }
    }

    #[tokio::test]
    async fn test_headers_are_stamped() {
        let mut svc = UserAgentLayer::new("eventfold-test/1.0").layer(Echo);
        let req = Request::builder()
            .uri("http://example.com/")
            .header(ACCEPT, "application/json")
            .body(String::new())
            .unwrap();
        let seen = svc.call(req).await.unwrap();
        assert_eq!(seen.headers()[USER_AGENT], "eventfold-test/1.0");
        assert_eq!(seen.headers()[ACCEPT], "application/json", "explicit Accept is kept");
        assert!(seen.headers().contains_key(ACCEPT_LANGUAGE));
    }
}
