use std::sync::LazyLock;

use regex_lite::Regex;

#[allow(clippy::expect_used)]
static PUBLIC_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"public\s+class\s+(\w+)").expect("public class pattern"));

/// A class whose body (allowing one level of nested braces) reaches a
/// `public static void main`.
#[allow(clippy::expect_used)]
static CLASS_WITH_MAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"class\s+(\w+)[^{]*\{(?:[^{}]|\{[^}]*\})*public\s+static\s+void\s+main")
        .expect("class with main pattern")
});

/// Finds the class a Java source file must be named after.
///
/// This is a two-rule heuristic, not a parser: the first `public class` wins;
/// failing that, the first class whose body contains `public static void
/// main`. Comments and string literals are not understood.
///
/// The patterns only know ASCII `\s` and `\w`. A name must start with an
/// ASCII word character; once it does, any following letters or digits,
/// ASCII or not, are part of the name.
pub fn find_main_class(source: &str) -> Option<String> {
    let caps = PUBLIC_CLASS
        .captures(source)
        .or_else(|| CLASS_WITH_MAIN.captures(source))?;
    let name = caps.get(1)?;
    let rest = &source[name.end()..];
    let tail = rest
        .find(|c: char| !is_identifier_char(c))
        .unwrap_or(rest.len());
    Some(source[name.start()..name.end() + tail].to_string())
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
