//! Purely lexical operations on `/`-separated paths.
//!
//! These mirror the behaviour of Go's `path/filepath` on Unix, because the
//! names and error messages we generate have to match those produced by
//! existing tooling byte for byte. `std::path` is not a substitute here: it
//! doesn't collapse `..`, and `Path::parent("/")` is `None` where we need `/`.

/// Return the shortest path equivalent to `path` by purely lexical
/// processing: collapse repeated slashes, drop `.` elements, resolve `..`
/// against the preceding element, and drop `..` at the root.
///
/// An empty result becomes `.` (or `/` for rooted paths).
pub fn clean(path: &str) -> String {
    if path.is_empty() {
        return ".".to_owned();
    }
    let rooted = path.starts_with('/');

    let mut elems: Vec<&str> = vec![];
    for elem in path.split('/') {
        match elem {
            "" | "." => {}
            ".." => match elems.last() {
                Some(&last) if last != ".." => {
                    elems.pop();
                }
                // `/..` is just `/`.
                _ if rooted => {}
                _ => elems.push(".."),
            },
            elem => elems.push(elem),
        }
    }

    let joined = elems.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_owned(),
        (false, false) => joined,
    }
}

/// Return everything but the last element of `path`, cleaned. A path
/// without any `/` has the directory `.`.
pub fn dir(path: &str) -> String {
    match path.rfind('/') {
        Some(idx) => clean(&path[..=idx]),
        None => clean(""),
    }
}

/// Return the last element of `path`, ignoring trailing slashes. Returns `.`
/// for an empty path and `/` for a path made only of slashes.
pub fn base(path: &str) -> String {
    if path.is_empty() {
        return ".".to_owned();
    }
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_owned();
    }
    match trimmed.rfind('/') {
        Some(idx) => trimmed[idx + 1..].to_owned(),
        None => trimmed.to_owned(),
    }
}

/// Join the non-empty `elems` with `/` and clean the result. Joining only
/// empty elements gives an empty string.
pub fn join(elems: &[&str]) -> String {
    let non_empty = elems
        .iter()
        .copied()
        .filter(|e| !e.is_empty())
        .collect::<Vec<_>>();
    if non_empty.is_empty() {
        String::new()
    } else {
        clean(&non_empty.join("/"))
    }
}

/// Is `path` absolute?
pub fn is_abs(path: &str) -> bool {
    path.starts_with('/')
}

#[test]
fn clean_matches_reference_behaviour() {
    let examples = &[
        ("", "."),
        (".", "."),
        ("/", "/"),
        ("//", "/"),
        ("abc", "abc"),
        ("abc/", "abc"),
        ("abc//def", "abc/def"),
        ("./abc", "abc"),
        ("abc/./def", "abc/def"),
        ("abc/..", "."),
        ("abc/../..", ".."),
        ("../../abc", "../../abc"),
        ("/../abc", "/abc"),
        ("/abc/def/../ghi", "/abc/ghi"),
        ("abc/def/../../..", ".."),
    ];
    for &(input, expected) in examples {
        assert_eq!(clean(input), expected, "clean({:?})", input);
    }
}

#[test]
fn dir_and_base_split_paths() {
    assert_eq!(dir("/some/mount"), "/some");
    assert_eq!(base("/some/mount"), "mount");
    assert_eq!(dir("/mount"), "/");
    assert_eq!(dir("fail"), ".");
    assert_eq!(base("fail"), "fail");
    assert_eq!(dir("my/file.yaml"), "my");
    assert_eq!(dir("/a/b/"), "/a/b");
    assert_eq!(base("/a/b/"), "b");
    assert_eq!(base("///"), "/");
    assert_eq!(base(""), ".");
}

#[test]
fn join_cleans_and_skips_empty_elements() {
    assert_eq!(join(&["my", "file.that.does.not.exist"]), "my/file.that.does.not.exist");
    assert_eq!(join(&[".", "x.txt"]), "x.txt");
    assert_eq!(join(&["a/b", "../c"]), "a/c");
    assert_eq!(join(&["", "x"]), "x");
    assert_eq!(join(&["", ""]), "");
}
