use serde::Serialize;

/// A starter manifest written by `sprout new`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Template {
    pub name: &'static str,
    pub description: &'static str,
    pub manifest: &'static str,
}

pub const BUILTIN_TEMPLATES: &[Template] = &[
    Template {
        name: "minimal",
        description: "Channel only, no packages or hooks",
        manifest: r#"manifest_version = 1
channel = "stable"
"#,
    },
    Template {
        name: "python",
        description: "Python service with dependency install and start script",
        manifest: r#"manifest_version = 1
channel = "stable"
packages = ["python3", "git", "curl"]
extensions = ["ms-python.python"]

[[hooks.onCreate]]
name = "install-deps"
command = "bash ./setup.sh"

[[hooks.onStart]]
name = "start-app"
command = "bash ./start.sh"

[previews]
enable = false

[[previews.entries]]
id = "web"
manager = "web"
command = ["python3", "-m", "http.server", "$PORT"]
port = 8080
"#,
    },
    Template {
        name: "node",
        description: "Node.js app with npm install and dev server preview",
        manifest: r#"manifest_version = 1
channel = "stable"
packages = ["nodejs", "git"]
services = ["docker"]

[[hooks.onCreate]]
name = "npm-install"
command = "npm ci"

[previews]
enable = true

[[previews.entries]]
id = "web"
manager = "web"
command = ["npm", "run", "dev", "--", "--port", "$PORT"]
port = 3000
"#,
    },
];

pub fn get_template(name: &str) -> Option<&'static Template> {
    BUILTIN_TEMPLATES.iter().find(|t| t.name == name)
}

pub fn list_templates() -> &'static [Template] {
    BUILTIN_TEMPLATES
}
