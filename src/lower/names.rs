// src/lower/names.rs
//
// Runtime-name mangling. Identifier characters that are illegal in host
// class and member names (slashes, dots, generic brackets) are normalized to
// '$'. Plural-field paths concatenate with '$'; plural-return channels carry
// the distinguished "RETURN! " prefix, which keeps them out of the user
// namespace.

/// Normalize a member or class-name segment
pub fn mangle(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '.' | '<' | '>' | ';' | '[' | ' ' | ',' => '$',
            other => other,
        })
        .collect()
}

/// Runtime name of a generic instance: the base name with one `$segment`
/// per argument.
pub fn instance_runtime_name(base: &str, args: &[&str]) -> String {
    let mut out = mangle(base);
    for arg in args {
        out.push('$');
        out.push_str(&mangle(arg));
    }
    out
}

/// Runtime name of a tuple type
pub fn tuple_runtime_name(elems: &[&str]) -> String {
    instance_runtime_name("Tuple", elems)
}

/// Runtime name of a func type: parameters, then `$$`, then the return
pub fn func_runtime_name(params: &[&str], ret: &str) -> String {
    let mut out = instance_runtime_name("Fn", params);
    out.push_str("$$");
    out.push_str(&mangle(ret));
    out
}

/// Flattened field name for a leaf reached through a path of plural fields
pub fn field_path_name(segments: &[String]) -> String {
    segments
        .iter()
        .map(|s| mangle(s))
        .collect::<Vec<_>>()
        .join("$")
}

/// Static channel carrying one non-first leaf of a plural return
pub fn return_channel_name(segments: &[String]) -> String {
    let mut out = String::from("RETURN! ");
    for segment in segments {
        out.push('$');
        out.push_str(&mangle(segment));
    }
    out
}

/// Runtime class name for a file's top-level code
pub fn file_class_name(file: &str) -> String {
    mangle(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slashes_and_dots_normalize() {
        assert_eq!(mangle("lib/util.sn"), "lib$util$sn");
        assert_eq!(mangle("plain"), "plain");
    }

    #[test]
    fn generic_instances_mangle_their_arguments() {
        assert_eq!(instance_runtime_name("Box", &["i32"]), "Box$i32");
        assert_eq!(
            instance_runtime_name("Pair", &["i32", "java/lang/String"]),
            "Pair$i32$java$lang$String"
        );
    }

    #[test]
    fn return_channels_join_the_field_path() {
        assert_eq!(
            return_channel_name(&["b".to_string()]),
            "RETURN! $b".to_string()
        );
        assert_eq!(
            return_channel_name(&["c".to_string(), "d".to_string()]),
            "RETURN! $c$d".to_string()
        );
    }

    #[test]
    fn field_paths_join_with_dollar() {
        assert_eq!(
            field_path_name(&["pos".to_string(), "x".to_string()]),
            "pos$x"
        );
    }
}
