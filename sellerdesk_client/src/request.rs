//! Immutable request descriptors

use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Method,
};
use serde::Serialize;

/// A description of a single API call
///
/// Descriptors are immutable once handed to the client; the pipeline's
/// expiry-driven replay works on a structural duplicate rather than mutating
/// shared request state, so a descriptor can safely be cloned and reused by
/// concurrent callers.
#[derive(Clone, Debug)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Option<serde_json::Value>,
}

impl ApiRequest {
    /// Constructs a descriptor for the given method and path
    ///
    /// `path` is resolved against the client's base URL, so relative paths
    /// such as `"products"` or `"orders/42"` are the norm.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// A `GET` descriptor
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// A `POST` descriptor
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// A `PUT` descriptor
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// A `DELETE` descriptor
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Appends a query parameter
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Sets a header, replacing any previous value for the same name
    ///
    /// An explicit `Authorization` header set here wins over the token the
    /// pipeline would otherwise attach on the first dispatch.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Attaches a JSON body
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, serde_json::Error> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub(crate) fn method(&self) -> &Method {
        &self.method
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn query_params(&self) -> &[(String, String)] {
        &self.query
    }

    pub(crate) fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub(crate) fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_accumulates_parts() {
        let descriptor = ApiRequest::post("orders")
            .query("expand", "items")
            .header(
                HeaderName::from_static("x-shop-id"),
                HeaderValue::from_static("7"),
            )
            .json(&serde_json::json!({ "sku": "A-1" }))
            .unwrap();

        assert_eq!(descriptor.method(), &Method::POST);
        assert_eq!(descriptor.path(), "orders");
        assert_eq!(
            descriptor.query_params(),
            &[("expand".to_owned(), "items".to_owned())]
        );
        assert_eq!(descriptor.headers().get("x-shop-id").unwrap(), "7");
        assert_eq!(
            descriptor.body().unwrap(),
            &serde_json::json!({ "sku": "A-1" })
        );
    }
}
