// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

//! Source-text fixup applied before compilation.

use std::borrow::Cow;

/// Directive we compile against when the caller's source names no version.
pub(crate) const VERSION_DIRECTIVE: &str = "#version 440 core\n";

/// Prepend [VERSION_DIRECTIVE] unless the source already opens with a version
/// directive. Leading whitespace is allowed before the caller's own directive and is
/// preserved either way.
pub(crate) fn with_version_directive(source: &str) -> Cow<'_, str> {
    if source.trim_start().starts_with("#version") {
        Cow::Borrowed(source)
    } else {
        let mut fixed = String::with_capacity(VERSION_DIRECTIVE.len() + source.len());
        fixed.push_str(VERSION_DIRECTIVE);
        fixed.push_str(source);
        Cow::Owned(fixed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_source_gains_the_directive() {
        let fixed = with_version_directive("void main() {}");
        assert_eq!(fixed, "#version 440 core\nvoid main() {}");
    }

    #[test]
    fn a_declared_version_is_respected() {
        let source = "#version 450 core\nvoid main() {}";
        assert!(matches!(
            with_version_directive(source),
            Cow::Borrowed(_)
        ));

        let indented = "\n  \t#version 450 core\nvoid main() {}";
        assert_eq!(with_version_directive(indented), indented);
    }

    #[test]
    fn fixup_is_stable_under_refeeding() {
        let once = with_version_directive("void main() {}").into_owned();
        let twice = with_version_directive(&once);
        assert_eq!(twice, once);
    }
}
