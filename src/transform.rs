//! AST normalization passes.
//!
//! Four structural rewrites run in a fixed order before compilation, each
//! preserving the matched language:
//!
//! 1. [`transform_curlies`] expands counted repetition into Cat/Quest/Star.
//! 2. [`transform_alt_groups`] collapses left-nested `Alt` chains into a
//!    flat `AltList`.
//! 3. [`escaped_nums_to_backrefs`] rewrites `\1`..`\9` escapes into
//!    backreference nodes.
//! 4. [`merge_custom_char_class_ranges`] flattens each class's
//!    left-chained `CharRange` spine into a children array.
//!
//! Every pass takes ownership of the tree and returns the rewritten tree;
//! replaced subtrees are dropped once the replacement is in place.

use tracing::debug;

use crate::ast::{CharClass, Regexp};

/// Runs the four passes in order.
pub fn transform(re: Regexp) -> Regexp {
    debug!("transforming regex (AST passes)");
    debug!("  curlies");
    let re = transform_curlies(re);
    debug!("  alt groups");
    let re = transform_alt_groups(re);
    debug!("  backrefs");
    let re = escaped_nums_to_backrefs(re);
    debug!("  custom char classes");
    merge_custom_char_class_ranges(re)
}

/// `A` concatenated `n` times, nesting to the right.
fn repeat_with_concat(a: &Regexp, n: i32) -> Regexp {
    assert!(n >= 1);
    let mut re = a.clone();
    for _ in 1..n {
        re = Regexp::Cat(Box::new(a.clone()), Box::new(re));
    }
    re
}

/// `A{,max}` as nested greedy questions: `(A(A(A)?)?)?` with `max` copies.
/// Built innermost-first so the nesting depth never exceeds `max`.
fn repeat_with_nested_quest(a: &Regexp, max: i32) -> Regexp {
    assert!(max > 0);
    let mut re = Regexp::Quest {
        greedy: true,
        sub: Box::new(a.clone()),
    };
    for _ in 1..max {
        re = Regexp::Quest {
            greedy: true,
            sub: Box::new(Regexp::Cat(Box::new(a.clone()), Box::new(re))),
        };
    }
    re
}

/// Expands every `Curly{min,max}` over subtree A into concatenation,
/// question, and star nodes over copies of the normalized A:
///
/// ```text
/// A{2}   ->  AA
/// A{1,2} ->  A(A)?
/// A{,2}  ->  (A(A)?)?
/// A{2,}  ->  AAA*
/// ```
pub fn transform_curlies(re: Regexp) -> Regexp {
    match re {
        Regexp::Curly { min, max, sub } => {
            debug!(min, max, "expanding curly");
            // At most one bound may be open; the parser enforced that.
            assert!(!(min == -1 && max == -1));
            let a = transform_curlies(*sub);

            // Factor out the mandatory prefix, reducing to A{,n}.
            let prefix_len = if min > 0 { min } else { 0 };
            let prefix = (min > 0).then(|| repeat_with_concat(&a, min));

            let suffix = if max == -1 {
                Some(Regexp::Star {
                    greedy: true,
                    sub: Box::new(a.clone()),
                })
            } else {
                let remainder = max - prefix_len;
                (remainder > 0).then(|| repeat_with_nested_quest(&a, remainder))
            };

            match (prefix, suffix) {
                (Some(p), Some(s)) => Regexp::Cat(Box::new(p), Box::new(s)),
                (Some(p), None) => p,
                (None, Some(s)) => s,
                (None, None) => unreachable!("curly with no expansion"),
            }
        }
        Regexp::Alt(l, r) => Regexp::Alt(
            Box::new(transform_curlies(*l)),
            Box::new(transform_curlies(*r)),
        ),
        Regexp::Cat(l, r) => Regexp::Cat(
            Box::new(transform_curlies(*l)),
            Box::new(transform_curlies(*r)),
        ),
        Regexp::Quest { greedy, sub } => Regexp::Quest {
            greedy,
            sub: Box::new(transform_curlies(*sub)),
        },
        Regexp::Star { greedy, sub } => Regexp::Star {
            greedy,
            sub: Box::new(transform_curlies(*sub)),
        },
        Regexp::Plus { greedy, sub } => Regexp::Plus {
            greedy,
            sub: Box::new(transform_curlies(*sub)),
        },
        Regexp::Paren(n, sub) => Regexp::Paren(n, Box::new(transform_curlies(*sub))),
        Regexp::Lookahead(sub) => Regexp::Lookahead(Box::new(transform_curlies(*sub))),
        Regexp::AltList(children) => {
            Regexp::AltList(children.into_iter().map(transform_curlies).collect())
        }
        // Terminals, including classes (their ranges hold no quantifiers).
        re @ (Regexp::Lit(_)
        | Regexp::Dot
        | Regexp::CharEscape(_)
        | Regexp::CustomCharClass(_)
        | Regexp::CharRange { .. }
        | Regexp::Backref(_)
        | Regexp::InlineZwa(_)) => re,
    }
}

/// Appends the members of a left-nested `Alt` chain to `out` in
/// left-to-right order.
fn fill_alt_children(re: Regexp, out: &mut Vec<Regexp>) {
    if let Regexp::Alt(l, r) = re {
        fill_alt_children(*l, out);
        out.push(*r);
    } else {
        out.push(re);
    }
}

/// Collapses `Alt(Alt(A, B), C)` chains into `AltList[A, B, C]`, then
/// normalizes the children.
pub fn transform_alt_groups(re: Regexp) -> Regexp {
    match re {
        re @ Regexp::Alt(..) => {
            let mut children = Vec::new();
            fill_alt_children(re, &mut children);
            debug!(arity = children.len(), "collapsing Alt chain into AltList");
            assert!(children.len() >= 2);
            Regexp::AltList(children.into_iter().map(transform_alt_groups).collect())
        }
        Regexp::Cat(l, r) => Regexp::Cat(
            Box::new(transform_alt_groups(*l)),
            Box::new(transform_alt_groups(*r)),
        ),
        Regexp::Quest { greedy, sub } => Regexp::Quest {
            greedy,
            sub: Box::new(transform_alt_groups(*sub)),
        },
        Regexp::Star { greedy, sub } => Regexp::Star {
            greedy,
            sub: Box::new(transform_alt_groups(*sub)),
        },
        Regexp::Plus { greedy, sub } => Regexp::Plus {
            greedy,
            sub: Box::new(transform_alt_groups(*sub)),
        },
        Regexp::Paren(n, sub) => Regexp::Paren(n, Box::new(transform_alt_groups(*sub))),
        Regexp::Lookahead(sub) => Regexp::Lookahead(Box::new(transform_alt_groups(*sub))),
        Regexp::Curly { min, max, sub } => Regexp::Curly {
            min,
            max,
            sub: Box::new(transform_alt_groups(*sub)),
        },
        Regexp::AltList(children) => {
            Regexp::AltList(children.into_iter().map(transform_alt_groups).collect())
        }
        re @ (Regexp::Lit(_)
        | Regexp::Dot
        | Regexp::CharEscape(_)
        | Regexp::CustomCharClass(_)
        | Regexp::CharRange { .. }
        | Regexp::Backref(_)
        | Regexp::InlineZwa(_)) => re,
    }
}

/// Rewrites every `CharEscape` of a digit `1`..`9` into a `Backref`
/// carrying that group number.
pub fn escaped_nums_to_backrefs(re: Regexp) -> Regexp {
    match re {
        Regexp::CharEscape(c) if (b'1'..=b'9').contains(&c) => {
            Regexp::Backref((c - b'0') as usize)
        }
        Regexp::Alt(l, r) => Regexp::Alt(
            Box::new(escaped_nums_to_backrefs(*l)),
            Box::new(escaped_nums_to_backrefs(*r)),
        ),
        Regexp::Cat(l, r) => Regexp::Cat(
            Box::new(escaped_nums_to_backrefs(*l)),
            Box::new(escaped_nums_to_backrefs(*r)),
        ),
        Regexp::Quest { greedy, sub } => Regexp::Quest {
            greedy,
            sub: Box::new(escaped_nums_to_backrefs(*sub)),
        },
        Regexp::Star { greedy, sub } => Regexp::Star {
            greedy,
            sub: Box::new(escaped_nums_to_backrefs(*sub)),
        },
        Regexp::Plus { greedy, sub } => Regexp::Plus {
            greedy,
            sub: Box::new(escaped_nums_to_backrefs(*sub)),
        },
        Regexp::Paren(n, sub) => Regexp::Paren(n, Box::new(escaped_nums_to_backrefs(*sub))),
        Regexp::Lookahead(sub) => Regexp::Lookahead(Box::new(escaped_nums_to_backrefs(*sub))),
        Regexp::Curly { min, max, sub } => Regexp::Curly {
            min,
            max,
            sub: Box::new(escaped_nums_to_backrefs(*sub)),
        },
        Regexp::AltList(children) => {
            Regexp::AltList(children.into_iter().map(escaped_nums_to_backrefs).collect())
        }
        // Escapes inside custom classes keep their character meaning.
        re @ (Regexp::Lit(_)
        | Regexp::Dot
        | Regexp::CharEscape(_)
        | Regexp::CustomCharClass(_)
        | Regexp::CharRange { .. }
        | Regexp::Backref(_)
        | Regexp::InlineZwa(_)) => re,
    }
}

/// Appends the `CharRange` spine rooted at `re` to `out` in source order
/// (the chain links newer ranges toward the root).
fn fill_class_children(re: Regexp, out: &mut Vec<Regexp>) {
    let Regexp::CharRange { left, lo, hi } = re else {
        panic!("char class chain held a non-range node");
    };
    if let Some(left) = left {
        fill_class_children(*left, out);
    }
    out.push(Regexp::CharRange { left: None, lo, hi });
}

/// Replaces each class's left-chained range spine with a flat children
/// array and marks it merged.
pub fn merge_custom_char_class_ranges(re: Regexp) -> Regexp {
    match re {
        Regexp::CustomCharClass(cc) => {
            let CharClass {
                invert,
                plus_dash,
                chain,
                ..
            } = cc;
            let mut children = Vec::new();
            if let Some(chain) = chain {
                fill_class_children(*chain, &mut children);
            }
            debug!(arity = children.len(), "merged char class ranges");
            Regexp::CustomCharClass(CharClass {
                invert,
                plus_dash,
                merged_ranges: true,
                chain: None,
                children,
            })
        }
        Regexp::Alt(l, r) => Regexp::Alt(
            Box::new(merge_custom_char_class_ranges(*l)),
            Box::new(merge_custom_char_class_ranges(*r)),
        ),
        Regexp::Cat(l, r) => Regexp::Cat(
            Box::new(merge_custom_char_class_ranges(*l)),
            Box::new(merge_custom_char_class_ranges(*r)),
        ),
        Regexp::Quest { greedy, sub } => Regexp::Quest {
            greedy,
            sub: Box::new(merge_custom_char_class_ranges(*sub)),
        },
        Regexp::Star { greedy, sub } => Regexp::Star {
            greedy,
            sub: Box::new(merge_custom_char_class_ranges(*sub)),
        },
        Regexp::Plus { greedy, sub } => Regexp::Plus {
            greedy,
            sub: Box::new(merge_custom_char_class_ranges(*sub)),
        },
        Regexp::Paren(n, sub) => Regexp::Paren(n, Box::new(merge_custom_char_class_ranges(*sub))),
        Regexp::Lookahead(sub) => {
            Regexp::Lookahead(Box::new(merge_custom_char_class_ranges(*sub)))
        }
        Regexp::Curly { min, max, sub } => Regexp::Curly {
            min,
            max,
            sub: Box::new(merge_custom_char_class_ranges(*sub)),
        },
        Regexp::AltList(children) => Regexp::AltList(
            children
                .into_iter()
                .map(merge_custom_char_class_ranges)
                .collect(),
        ),
        re @ (Regexp::Lit(_)
        | Regexp::Dot
        | Regexp::CharEscape(_)
        | Regexp::CharRange { .. }
        | Regexp::Backref(_)
        | Regexp::InlineZwa(_)) => re,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;

    fn normalized(pattern: &str) -> Regexp {
        transform(parse(pattern).unwrap())
    }

    /// No Curly, no raw Alt, no unmerged class, no digit escape anywhere.
    fn assert_normalized(re: &Regexp) {
        match re {
            Regexp::Curly { .. } => panic!("curly survived: {re}"),
            Regexp::Alt(..) => panic!("alt survived: {re}"),
            Regexp::CharEscape(c) if c.is_ascii_digit() && *c != b'0' => {
                panic!("digit escape survived: {re}")
            }
            Regexp::CustomCharClass(cc) => {
                assert!(cc.merged_ranges, "unmerged class: {re}");
                assert!(cc.chain.is_none());
                for child in &cc.children {
                    assert!(matches!(child, Regexp::CharRange { left: None, .. }));
                }
            }
            Regexp::Cat(l, r) => {
                assert_normalized(l);
                assert_normalized(r);
            }
            Regexp::Paren(_, sub)
            | Regexp::Quest { sub, .. }
            | Regexp::Star { sub, .. }
            | Regexp::Plus { sub, .. }
            | Regexp::Lookahead(sub) => assert_normalized(sub),
            Regexp::AltList(children) => children.iter().for_each(assert_normalized),
            _ => {}
        }
    }

    #[test]
    fn curly_exact_becomes_concat() {
        let re = transform_curlies(parse("a{3}").unwrap());
        assert_eq!(re.to_string(), "Paren(0, Cat(Lit(a), Cat(Lit(a), Lit(a))))");
    }

    #[test]
    fn curly_range_factors_prefix_and_nested_quest() {
        let re = transform_curlies(parse("a{1,3}").unwrap());
        assert_eq!(
            re.to_string(),
            "Paren(0, Cat(Lit(a), Quest(Cat(Lit(a), Quest(Lit(a))))))"
        );
    }

    #[test]
    fn curly_open_max_becomes_star_suffix() {
        let re = transform_curlies(parse("a{2,}").unwrap());
        assert_eq!(
            re.to_string(),
            "Paren(0, Cat(Cat(Lit(a), Lit(a)), Star(Lit(a))))"
        );
    }

    #[test]
    fn curly_open_min_is_pure_nested_quest() {
        let re = transform_curlies(parse("a{,2}").unwrap());
        assert_eq!(re.to_string(), "Paren(0, Quest(Cat(Lit(a), Quest(Lit(a)))))");
    }

    #[test]
    fn curly_expansion_copies_whole_subtree() {
        let re = transform_curlies(parse("(ab){2}").unwrap());
        assert_eq!(
            re.to_string(),
            "Paren(0, Cat(Paren(1, Cat(Lit(a), Lit(b))), Paren(1, Cat(Lit(a), Lit(b)))))"
        );
    }

    #[test]
    fn alt_chain_flattens_in_order() {
        let re = transform_alt_groups(parse("a|b|c|d").unwrap());
        assert_eq!(
            re.to_string(),
            "Paren(0, AltList(Lit(a), Lit(b), Lit(c), Lit(d)))"
        );
    }

    #[test]
    fn nested_alts_flatten_independently() {
        let re = transform_alt_groups(parse("a|(b|c)").unwrap());
        assert_eq!(
            re.to_string(),
            "Paren(0, AltList(Lit(a), Paren(1, AltList(Lit(b), Lit(c)))))"
        );
    }

    #[test]
    fn digit_escapes_become_backrefs() {
        let re = escaped_nums_to_backrefs(parse(r"(a)\1\0").unwrap());
        assert_eq!(
            re.to_string(),
            "Paren(0, Cat(Cat(Paren(1, Lit(a)), Backref(1)), Esc(0)))"
        );
    }

    #[test]
    fn class_ranges_merge_flat_in_source_order() {
        let re = normalized(r"[a-cx\d]");
        let Regexp::Paren(0, inner) = re else { panic!() };
        let Regexp::CustomCharClass(cc) = *inner else {
            panic!()
        };
        assert!(cc.merged_ranges);
        assert_eq!(cc.children.len(), 3);
        assert_eq!(cc.children[0].to_string(), "Range(a-c)");
        assert_eq!(cc.children[1].to_string(), "Range(x-x)");
        assert_eq!(cc.children[2].to_string(), "Range(\\d-\\d)");
    }

    #[test]
    fn full_pipeline_leaves_only_normalized_shapes() {
        for pattern in [
            "a{2,4}(b|c|d)[x-z\\w]\\1",
            "(a|b){1,2}",
            "((a)|(b)){2}c?",
            r"[-a\d]{3,}",
        ] {
            let re = normalized(pattern);
            assert_normalized(&re);
        }
    }
}
