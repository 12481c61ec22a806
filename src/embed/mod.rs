//! Embedded static resources.
//!
//! - `template` - Template types for typed variable injection
//! - `serve` - Preview server pages (view.html)
//!
//! # Usage
//!
//! ```ignore
//! use embed::serve::{VIEW_HTML, ViewVars};
//!
//! let html = VIEW_HTML.render(&ViewVars { cache_token: 1718000000000, viewer_port: 40123 });
//! ```

mod template;

pub use template::{Template, TemplateVars};

pub mod serve {
    use super::{Template, TemplateVars};

    /// Variables for view.html template.
    pub struct ViewVars {
        /// Initial `?t=` query value of the iframe, defeats browser caching.
        pub cache_token: u128,
        /// Port of the viewer channel listener.
        pub viewer_port: u16,
    }

    impl TemplateVars for ViewVars {
        fn apply(&self, content: &str) -> String {
            content
                .replace("__CACHE_TOKEN__", &self.cache_token.to_string())
                .replace("__VIEWER_PORT__", &self.viewer_port.to_string())
        }
    }

    /// Viewer page: PDF iframe plus the live-reload client.
    pub const VIEW_HTML: Template<ViewVars> = Template::new(include_str!("serve/view.html"));

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_view_renders_cache_token() {
            let html = VIEW_HTML.render(&ViewVars {
                cache_token: 42,
                viewer_port: 40123,
            });
            assert!(html.contains(r#"src="/pdf?t=42""#));
            assert!(html.contains("':' + 40123 + '/'"));
            assert!(!html.contains("__CACHE_TOKEN__"));
            assert!(!html.contains("__VIEWER_PORT__"));
            assert!(html.contains("data.type === 'reload'"));
            assert!(html.contains("location.reload()"));
        }
    }
}
