use once_cell::sync::Lazy;
use regex::Regex;

const TYPE: &str = r"\[*(?:[VZBSCIJFD]|L[\w$/-]+?;)";
const OWNER: &str = r"\[*L[\w$/-]+?;";

pub static TYPE_PATTERN: Lazy<Regex> = Lazy::new(|| compile(TYPE));

/// A class descriptor, optionally wrapped in array dimensions.
pub static CLASS_DESCRIPTOR: Lazy<Regex> = Lazy::new(|| compile(OWNER));

pub static FIELD_REFERENCE: Lazy<Regex> =
    Lazy::new(|| compile(&format!(r"{OWNER}->[\w$-]+:{TYPE}")));

pub static METHOD_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(
        r"{OWNER}->(?:[\w$-]+|<init>|<clinit>)\((?:{TYPE})*\){TYPE}"
    ))
});

pub static STRING_LITERAL: Lazy<Regex> = Lazy::new(|| compile(r#""(?:[^"\\]|\\.)*""#));

pub static LABEL: Lazy<Regex> = Lazy::new(|| compile(r":[\w$]+"));

fn compile(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(err) => panic!("invalid built-in pattern {pattern}: {err}"),
    }
}

/// Opcode prefixes of instructions that access a field through `Owner->name:Type`.
pub const FIELD_OPCODES: &[&str] = &["iget", "iput", "sget", "sput"];

/// Opcode prefix of instructions that call `Owner->name(Params)Return`.
pub const INVOKE_OPCODE: &str = "invoke";

/// Opcodes whose last operand is a bare type descriptor.
pub const TYPE_OPCODES: &[&str] = &[
    "const-class",
    "new-instance",
    "check-cast",
    "instance-of",
    "new-array",
    "filled-new-array",
];

/// The first match of `regex` in `line` covering the character at column `col`.
pub fn match_at<'t>(regex: &Regex, line: &'t str, col: usize) -> Option<regex::Match<'t>> {
    regex
        .find_iter(line)
        .find(|m| m.start() <= col && col < m.end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_reference_matches_instruction_operand() {
        let line = "    sget-object v0, Lcom/example/Foo;->x:I";
        let m = FIELD_REFERENCE.find(line).unwrap();
        assert_eq!(m.as_str(), "Lcom/example/Foo;->x:I");
        assert_eq!(m.start(), 20);
    }

    #[test]
    fn method_reference_matches_constructors_and_arrays() {
        let line = "invoke-direct {p0, v1}, Lcom/A;-><init>(I[Ljava/lang/String;)V";
        let m = METHOD_REFERENCE.find(line).unwrap();
        assert_eq!(m.as_str(), "Lcom/A;-><init>(I[Ljava/lang/String;)V");

        let line = "invoke-virtual {v0}, [I->clone()Ljava/lang/Object;";
        assert!(METHOD_REFERENCE.find(line).is_none());
        let line = "invoke-virtual {v0}, [Lcom/A;->clone()Ljava/lang/Object;";
        assert!(METHOD_REFERENCE.find(line).is_some());
    }

    #[test]
    fn match_at_requires_column_inside_match() {
        let line = r#"const-string v0, "hi there""#;
        assert!(match_at(&STRING_LITERAL, line, 20).is_some());
        assert!(match_at(&STRING_LITERAL, line, 3).is_none());
        assert!(match_at(&STRING_LITERAL, line, line.len()).is_none());
    }
}
