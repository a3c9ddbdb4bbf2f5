//! include / exclude 名称匹配
//!
//! glob 规则转换为正则：`*` 不跨目录，`**` 作为完整路径段时匹配任意层目录，
//! 支持 `?`、`[...]`（`[!...]` 取反）和 `{a,b}`。以 `.` 开头的文件同样参与匹配。

use regex::{Regex, RegexBuilder};

#[derive(Debug, Clone)]
pub struct NameMatcher {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl NameMatcher {
    pub fn new(include: &[String], exclude: &[String], case_sensitive: bool) -> Result<Self, regex::Error> {
        let compile = |patterns: &[String]| -> Result<Vec<Regex>, regex::Error> {
            patterns
                .iter()
                .filter(|p| !p.is_empty())
                .map(|p| {
                    RegexBuilder::new(&glob_to_regex(p))
                        .case_insensitive(!case_sensitive)
                        .build()
                })
                .collect()
        };

        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    /// 不过滤任何名称
    pub fn all() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }

    /// 排除优先；include 为空时不限制
    pub fn is_match(&self, name: &str) -> bool {
        if name.is_empty() {
            return false;
        }
        if self.exclude.iter().any(|re| re.is_match(name)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|re| re.is_match(name))
    }
}

fn glob_to_regex(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut re = String::with_capacity(pattern.len() * 2 + 2);
    let mut brace_depth = 0usize;
    let mut i = 0;

    re.push('^');
    while i < chars.len() {
        match chars[i] {
            '*' => {
                let start = i;
                while i < chars.len() && chars[i] == '*' {
                    i += 1;
                }
                let whole_segment = (start == 0 || chars[start - 1] == '/')
                    && (i == chars.len() || chars[i] == '/');

                if i - start >= 2 && whole_segment {
                    if i == chars.len() {
                        re.push_str(".*");
                    } else {
                        // "**/" 匹配零或多层目录
                        re.push_str("(?:.*/)?");
                        i += 1;
                    }
                } else {
                    re.push_str("[^/]*");
                }
                continue;
            }
            '?' => re.push_str("[^/]"),
            '[' => match chars[i + 1..].iter().position(|&c| c == ']') {
                Some(offset) if offset > 0 => {
                    let class = &chars[i + 1..i + 1 + offset];
                    re.push('[');
                    for (n, &c) in class.iter().enumerate() {
                        match c {
                            '!' if n == 0 => re.push('^'),
                            '\\' | '[' | ']' | '^' => {
                                re.push('\\');
                                re.push(c);
                            }
                            _ => re.push(c),
                        }
                    }
                    re.push(']');
                    i += offset + 1;
                }
                _ => re.push_str("\\["),
            },
            '{' => {
                brace_depth += 1;
                re.push_str("(?:");
            }
            '}' if brace_depth > 0 => {
                brace_depth -= 1;
                re.push(')');
            }
            ',' if brace_depth > 0 => re.push('|'),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }

    // 未闭合的 {
    for _ in 0..brace_depth {
        re.push(')');
    }
    re.push('$');
    re
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(include: &[&str], exclude: &[&str]) -> NameMatcher {
        let to_vec = |p: &[&str]| p.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        NameMatcher::new(&to_vec(include), &to_vec(exclude), false).unwrap()
    }

    #[test]
    fn test_double_star_matches_any_depth() {
        let m = matcher(&["**/**"], &[]);
        assert!(m.is_match("a.txt"));
        assert!(m.is_match("a/b/c.txt"));
        assert!(m.is_match(".hidden"));
    }

    #[test]
    fn test_single_star_stays_in_segment() {
        let m = matcher(&["*.txt"], &[]);
        assert!(m.is_match("a.txt"));
        assert!(!m.is_match("dir/a.txt"));
        assert!(!m.is_match("a.md"));
    }

    #[test]
    fn test_excludes_win() {
        let m = matcher(
            &["**/**"],
            &["**/.git/**", "**/.DS_Store", "**/.s3sync.trash/**", "**/.s3sync.json"],
        );
        assert!(!m.is_match(".git/config"));
        assert!(!m.is_match("sub/.git/objects/ab"));
        assert!(!m.is_match(".DS_Store"));
        assert!(!m.is_match("photos/.DS_Store"));
        assert!(!m.is_match(".s3sync.trash/.keep"));
        assert!(!m.is_match(".s3sync.trash/2024-01-01_00-00-00/a.txt.x.txt"));
        assert!(!m.is_match(".s3sync.json"));
        assert!(m.is_match("src/main.rs"));
        assert!(m.is_match(".gitignore"));
    }

    #[test]
    fn test_case_sensitivity_flag() {
        let insensitive = matcher(&["**/*.TXT"], &[]);
        assert!(insensitive.is_match("docs/a.txt"));

        let sensitive =
            NameMatcher::new(&["**/*.TXT".to_string()], &[], true).unwrap();
        assert!(!sensitive.is_match("docs/a.txt"));
        assert!(sensitive.is_match("docs/a.TXT"));
    }

    #[test]
    fn test_braces_classes_and_question_mark() {
        let m = matcher(&["**/*.{md,txt}"], &["draft?.md", "[!a]*.txt"]);
        assert!(m.is_match("notes/x.md"));
        assert!(m.is_match("a.txt"));
        assert!(!m.is_match("b.txt"));
        assert!(!m.is_match("draft1.md"));
        assert!(m.is_match("draft12.md"));
        assert!(!m.is_match("x.rs"));
    }

    #[test]
    fn test_empty_include_means_everything() {
        let m = matcher(&[], &["*.tmp"]);
        assert!(m.is_match("a/b.tmp"));
        assert!(!m.is_match("b.tmp"));
        assert!(!m.is_match(""));
        assert!(NameMatcher::all().is_match("anything/at/all"));
    }
}
