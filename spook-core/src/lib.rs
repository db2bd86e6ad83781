pub mod builder;
pub mod config;
pub mod frontmatter;
pub mod funcs;
pub mod layout;
pub mod markdown;
pub mod model;
pub mod paginate;
pub mod parser;
pub mod renderer;
pub mod scaffold;
pub mod site;
pub mod taxonomy;
pub mod thumbnail;

// Re-export main types
pub use builder::{BuildError, BuildReport, build_site};
pub use config::{Config, ConfigError};
pub use funcs::FunctionTable;
pub use model::{Group, Page, Post};
pub use parser::{ContentParser, ItemError, ParseError, Skipped};
pub use renderer::{ListSummary, RenderError, Renderer};
pub use site::Site;
pub use taxonomy::ListKind;
