//! Request pipeline shared by the ingress handlers: planning, upstream
//! dispatch with the single tools retry, and response delivery.

mod deliver;
mod dispatch;
mod plan;

pub(crate) use deliver::{collect, stream_body};
pub(crate) use dispatch::{dispatch, UpstreamCall};
pub(crate) use plan::{reasoning_for, ModelChoice, ToolPlan};
