//! Email templates: layered lookup and placeholder rendering.

pub mod render;
pub mod resolver;

pub use render::{TemplateVars, render_template};
pub use resolver::{
    BUILTIN_FOLLOW_UP_TEMPLATE, BuiltinSource, DEFAULT_TEMPLATE_KEY, DirectorySource,
    SharedRootSource, TemplateResolver, TemplateSource, normalize_template_key,
};
