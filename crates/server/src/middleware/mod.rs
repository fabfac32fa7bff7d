pub mod auth;
pub mod model_loaders;

pub use model_loaders::{
    load_comment_middleware, load_project_middleware, load_ticket_middleware,
};
