pub mod model;
pub mod reasoning;

pub use model::normalize_model_name;
pub use reasoning::{
    build_reasoning_param, extract_reasoning_from_model_name, reasoning_view, ReasoningOverrides,
    ReasoningView,
};
