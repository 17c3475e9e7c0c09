//! 基础设施层：持有稀缺资源（Browser），只暴露能力

pub mod html;
pub mod page_renderer;

pub use page_renderer::PageRenderer;
