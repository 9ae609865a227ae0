#[derive(thiserror::Error, Debug)]
pub enum AggregateError {
    #[error("Invalid aggregate type: {0}")]
    InvalidAggregateType(String),

    #[error("Call to undefined relationship [{relation}] on model [{model}]")]
    RelationNotFound { model: String, relation: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type AggregateResult<T> = Result<T, AggregateError>;
