//! Path normalization and comparison tests using rstest for parameterization.

use rstest::rstest;
use sandfs_kernel::{PathSandbox, SandFs};

#[rstest]
#[case::trailing_slash("/a/b/", "/a/b")]
#[case::dot_segments("/a/./b/.", "/a/b")]
#[case::doubled_separators("//a///b", "/a/b")]
#[case::dotdot("/a/x/../b", "/a/b")]
#[case::relative_input("a/b", "/a/b")]
#[case::escape_attempt("../../../a/b", "/a/b")]
#[case::root_spellings("/./../", "/")]
#[case::empty("", "/")]
fn normalization(#[case] input: &str, #[case] expected: &str) {
    let sandbox = PathSandbox::default();
    assert_eq!(sandbox.normalize(input).to_string(), expected);
}

#[rstest]
#[case("/a/b", "a/b/")]
#[case("/a/b", "/a/./c/../b")]
#[case("/", "/x/..")]
#[case("/a b/c", "/a b//c")]
fn differently_spelled_paths_are_equal(#[case] a: &str, #[case] b: &str) {
    let sandbox = PathSandbox::default();
    assert!(sandbox.equals(a, b));
    assert!(sandbox.equals(b, a));
}

#[test]
fn normalization_is_idempotent() {
    let sandbox = PathSandbox::default();
    for input in ["/a/../b/./c/", "x//y/..", "../..", "/"] {
        let once = sandbox.normalize(input).to_string();
        assert_eq!(sandbox.normalize(&once).to_string(), once);
    }
}

#[rstest]
#[case::child("/a", "/a/b", true)]
#[case::grandchild("/a", "/a/b/c", true)]
#[case::root_of_all("/", "/a", true)]
#[case::self_is_not_parent("/a/b", "/a/b/", false)]
#[case::root_not_own_parent("/", "/", false)]
#[case::sibling_prefix("/a", "/ab", false)]
#[case::reversed("/a/b", "/a", false)]
fn ancestry(#[case] parent: &str, #[case] path: &str, #[case] expected: bool) {
    let sandbox = PathSandbox::default();
    assert_eq!(sandbox.is_ancestor(parent, path), expected);
}

#[test]
fn ancestry_is_a_strict_order() {
    let sandbox = PathSandbox::default();
    let paths = ["/", "/a", "/a/b", "/a/b/c", "/z"];
    for a in paths {
        assert!(!sandbox.is_ancestor(a, a));
        for b in paths {
            if sandbox.is_ancestor(a, b) {
                assert!(!sandbox.is_ancestor(b, a), "{a} and {b} are mutual ancestors");
            }
        }
    }
}

#[test]
fn facade_path_helpers() {
    let fs = SandFs::memory();
    assert_eq!(fs.normalize("a//b/../c/"), "/a/c");
    assert_eq!(fs.relatively("/a/b/"), "a/b");
    assert_eq!(fs.relative("/a/b", "/a/c"), "../c");
    assert!(fs.is_equal("/a/b", "a/b/."));
    assert!(fs.is_parent_dir("/a", "/a/b"));
    assert!(!fs.is_parent_dir("/a", "/a"));
    assert_eq!(fs.replace_parent_dir("/a/b/c", "/a", "/x"), "/x/b/c");
    assert_eq!(fs.replace_parent_dir("/q/c", "/a", "/x"), "/q/c");
}
