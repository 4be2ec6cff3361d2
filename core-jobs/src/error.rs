use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Job {job_id} not found")]
    NotFound { job_id: String },

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Invalid job id: {0}")]
    InvalidJobId(String),

    #[error("Invalid job status: {0}")]
    InvalidStatus(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Dispatcher error: {0}")]
    Dispatch(String),
}

pub type Result<T> = std::result::Result<T, JobError>;
