//! Rendering equivalent engine command lines.
//!
//! Dump mode prints the `docker` invocation a verb would have performed
//! instead of performing it. The output contract is strict so it can be
//! diffed and scripted against: long-form flags sorted lexically,
//! list-valued flags keeping their insertion order within the flag,
//! single-valued flags taking the last assignment, positional arguments
//! last. `CommandLine` is a plain value with a pure [`render`]; nothing
//! here touches the engine.
//!
//! [`render`]: CommandLine::render

use indexmap::IndexMap;

/// Output layout for a rendered command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Style {
    /// One argument per line, backslash-continued and tab-indented.
    #[default]
    Pretty,
    /// Everything on one line.
    Compact,
}

impl Style {
    fn separator(self) -> &'static str {
        match self {
            Style::Pretty => "\\\n\t",
            Style::Compact => " ",
        }
    }
}

/// An accumulating engine invocation.
#[derive(Debug, Clone, Default)]
pub struct CommandLine {
    subcommand: String,
    flags: Vec<String>,
    single: IndexMap<String, String>,
    multi: IndexMap<String, Vec<String>>,
    positionals: Vec<String>,
}

impl CommandLine {
    /// Start a command line for an engine subcommand (`run`, `build`, …).
    #[must_use]
    pub fn new(subcommand: impl Into<String>) -> CommandLine {
        CommandLine {
            subcommand: subcommand.into(),
            ..CommandLine::default()
        }
    }

    /// Add or remove a boolean flag. Adding twice is idempotent.
    #[must_use]
    pub fn flag(mut self, name: &str, on: bool) -> CommandLine {
        if on {
            if !self.flags.iter().any(|f| f == name) {
                self.flags.push(name.to_string());
            }
        } else {
            self.flags.retain(|f| f != name);
        }
        self
    }

    /// Set a single-valued flag; the last assignment wins. Empty values
    /// are ignored.
    #[must_use]
    pub fn option(mut self, name: &str, value: impl Into<String>) -> CommandLine {
        let value = value.into();
        if !value.is_empty() {
            self.single.insert(name.to_string(), value);
        }
        self
    }

    /// Append a value to a list-valued flag, keeping insertion order and
    /// dropping duplicates.
    #[must_use]
    pub fn list(mut self, name: &str, value: impl Into<String>) -> CommandLine {
        let value = value.into();
        if !value.is_empty() {
            let values = self.multi.entry(name.to_string()).or_default();
            if !values.contains(&value) {
                values.push(value);
            }
        }
        self
    }

    /// Append several values to a list-valued flag.
    #[must_use]
    pub fn list_all<I, S>(mut self, name: &str, values: I) -> CommandLine
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for value in values {
            self = self.list(name, value);
        }
        self
    }

    /// Append a positional argument. Positionals render last, in the
    /// order given.
    #[must_use]
    pub fn positional(mut self, value: impl Into<String>) -> CommandLine {
        let value = value.into();
        if !value.is_empty() {
            self.positionals.push(value);
        }
        self
    }

    /// Render the invocation. Byte-deterministic for a given input.
    #[must_use]
    pub fn render(&self, style: Style) -> String {
        let mut args: Vec<(String, String)> = Vec::new();
        for flag in &self.flags {
            args.push((flag.clone(), String::new()));
        }
        for (name, value) in &self.single {
            args.push((name.clone(), value.clone()));
        }
        for (name, values) in &self.multi {
            for value in values {
                args.push((name.clone(), value.clone()));
            }
        }
        // Stable sort: repeated flags keep their insertion order.
        args.sort_by(|a, b| a.0.cmp(&b.0));

        let sep = style.separator();
        let mut out = format!("docker {}", self.subcommand);
        for (name, value) in &args {
            out.push_str(sep);
            out.push_str(name);
            if !value.is_empty() {
                out.push(' ');
                out.push_str(&quoted(value));
            }
        }
        for positional in &self.positionals {
            out.push_str(sep);
            out.push_str(&quoted(positional));
        }
        out
    }
}

fn quoted(value: &str) -> String {
    if value.chars().any(|c| c.is_whitespace() || c == '\'' || c == '"') {
        shlex::try_quote(value).map_or_else(|_| value.to_string(), |q| q.into_owned())
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn flags_sort_lexically() {
        let line = CommandLine::new("run")
            .option("--name", "api")
            .flag("--detach", true)
            .list("--volume", "data:/var/lib/data")
            .option("--hostname", "api")
            .positional("busybox:latest");
        assert_eq!(
            line.render(Style::Compact),
            "docker run --detach --hostname api --name api --volume data:/var/lib/data busybox:latest"
        );
    }

    #[test]
    fn pretty_renders_one_argument_per_line() {
        let line = CommandLine::new("build")
            .option("--tag", "app:dev")
            .flag("--pull", true);
        assert_eq!(
            line.render(Style::Pretty),
            "docker build\\\n\t--pull\\\n\t--tag app:dev"
        );
    }

    #[test]
    fn list_flags_keep_insertion_order() {
        let line = CommandLine::new("run")
            .list("--volume", "b:/b")
            .list("--volume", "a:/a")
            .list("--volume", "b:/b");
        assert_eq!(
            line.render(Style::Compact),
            "docker run --volume b:/b --volume a:/a"
        );
    }

    #[test]
    fn single_valued_flags_take_the_last_assignment() {
        let line = CommandLine::new("run")
            .option("--name", "one")
            .option("--name", "two");
        assert_eq!(line.render(Style::Compact), "docker run --name two");
    }

    #[test]
    fn disabled_flags_are_removed() {
        let line = CommandLine::new("build")
            .flag("--no-cache", true)
            .flag("--no-cache", false);
        assert_eq!(line.render(Style::Compact), "docker build");
    }

    #[test]
    fn rendering_is_deterministic() {
        let line = CommandLine::new("run")
            .flag("--tty", true)
            .flag("--interactive", true)
            .option("--user", "1000:1000")
            .list("--env", "A=1")
            .list("--env", "B=2")
            .positional("app:latest");
        assert_eq!(line.render(Style::Compact), line.render(Style::Compact));
    }

    #[test]
    fn values_with_spaces_are_quoted() {
        let line = CommandLine::new("run").list("--env", "GREETING=hello world");
        assert_eq!(
            line.render(Style::Compact),
            "docker run --env 'GREETING=hello world'"
        );
    }
}
