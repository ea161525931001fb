//! `Json` and `Query` wrappers whose rejections render through [`AppError`],
//! so malformed bodies and query strings get the usual `{msg, kind}` reply.

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::AppError;

pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => {
                warn!(error = %rejection.body_text(), "rejected json body");
                Err(AppError::validation("Malformed JSON body"))
            }
        }
    }
}

pub struct QueryParams<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for QueryParams<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(QueryParams(value)),
            Err(rejection) => {
                warn!(error = %rejection.body_text(), "rejected query string");
                Err(AppError::validation("Invalid query parameters"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::header::CONTENT_TYPE};

    use crate::{pets::dto::Pagination, users::dto::LoginRequest};

    fn json_request(body: &'static str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/users/login")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    fn query_parts(uri: &str) -> Parts {
        Request::builder().uri(uri).body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn malformed_json_is_a_validation_error() {
        let err = JsonBody::<LoginRequest>::from_request(json_request("{\"email\": "), &())
            .await
            .err()
            .unwrap();
        assert!(matches!(&err, AppError::Validation(m) if m == "Malformed JSON body"));
        assert_eq!(err.kind(), "validation_error");
    }

    #[tokio::test]
    async fn well_formed_json_passes_through() {
        let JsonBody(login) =
            JsonBody::<LoginRequest>::from_request(json_request("{\"email\":\"a@b.io\"}"), &())
                .await
                .ok()
                .unwrap();
        assert_eq!(login.email.as_deref(), Some("a@b.io"));
        assert!(login.password.is_none());
    }

    #[tokio::test]
    async fn non_numeric_page_is_a_validation_error() {
        let err = QueryParams::<Pagination>::from_request_parts(&mut query_parts("/pets?page=abc"), &())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::Validation(_)));

        let QueryParams(p) =
            QueryParams::<Pagination>::from_request_parts(&mut query_parts("/pets?page=2"), &())
                .await
                .ok()
                .unwrap();
        assert_eq!(p.page, Some(2));
        assert_eq!(p.limit, None);
    }
}
