use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dog_auth::Rejection;
use dog_core::errors::{AdmissionError, DogError};

#[derive(Debug)]
pub struct DogAxumError(pub anyhow::Error);

impl From<anyhow::Error> for DogAxumError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

impl From<AdmissionError> for DogAxumError {
    fn from(e: AdmissionError) -> Self {
        Self(anyhow::Error::new(e))
    }
}

impl From<Rejection> for DogAxumError {
    fn from(r: Rejection) -> Self {
        r.into_error().into()
    }
}

impl From<DogError> for DogAxumError {
    fn from(e: DogError) -> Self {
        Self(e.into_anyhow())
    }
}

impl IntoResponse for DogAxumError {
    fn into_response(self) -> Response {
        // Admission errors carry their own status and client-safe message.
        if let Some(admission) = self.0.chain().find_map(|e| e.downcast_ref::<AdmissionError>()) {
            return dog_response(&admission.to_dog_error());
        }

        // If it’s a DogError (even if wrapped by anyhow contexts), preserve Feathers-ish fields
        if let Some(dog) = self.0.chain().find_map(|e| e.downcast_ref::<DogError>()) {
            return dog_response(dog);
        }

        // Fallback: anything else is a GeneralError; detail stays in the logs
        tracing::error!("Unhandled error: {:?}", self.0);
        dog_response(&DogError::general_error("Error processing request."))
    }
}

fn dog_response(dog: &DogError) -> Response {
    let status = StatusCode::from_u16(dog.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(dog.to_json())).into_response()
}
