// Middleware module - request logging and request ids

pub mod request_logger;

pub use request_logger::{
    CURRENT_REQUEST_ID, REQUEST_ID_HEADER, current_request_id, request_logger_middleware,
};
