//! Native functions available to programs under fixed names.

use crate::object::{Object, ObjectType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinFunction {
    Len,
    UnicodeLen,
    First,
    Last,
    Rest,
    Push,
    Puts,
}

impl BuiltinFunction {
    pub fn name(self) -> &'static str {
        match self {
            Self::Len => "len",
            Self::UnicodeLen => "unicodeLen",
            Self::First => "first",
            Self::Last => "last",
            Self::Rest => "rest",
            Self::Push => "push",
            Self::Puts => "puts",
        }
    }

    /// Invokes the builtin on already evaluated arguments. `puts` appends to
    /// `output`; every failure comes back as an `Error` object.
    pub fn call(self, args: &[Object], output: &mut Vec<String>) -> Object {
        match self {
            Self::Len => len(args),
            Self::UnicodeLen => unicode_len(args),
            Self::First => first(args),
            Self::Last => last(args),
            Self::Rest => rest(args),
            Self::Push => push(args),
            Self::Puts => {
                output.extend(args.iter().map(Object::inspect));
                Object::Null
            }
        }
    }
}

/// Ordered, immutable builtin table. The position of a builtin is the operand
/// of `OpGetBuiltin`, so compiler and VM must share the same table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Builtins {
    functions: Vec<BuiltinFunction>,
}

impl Builtins {
    pub fn standard() -> Self {
        Self {
            functions: vec![
                BuiltinFunction::Len,
                BuiltinFunction::UnicodeLen,
                BuiltinFunction::First,
                BuiltinFunction::Last,
                BuiltinFunction::Rest,
                BuiltinFunction::Push,
                BuiltinFunction::Puts,
            ],
        }
    }

    pub fn lookup(&self, name: &str) -> Option<BuiltinFunction> {
        self.functions
            .iter()
            .copied()
            .find(|builtin| builtin.name() == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.functions
            .iter()
            .position(|builtin| builtin.name() == name)
    }

    pub fn get(&self, index: usize) -> Option<BuiltinFunction> {
        self.functions.get(index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = BuiltinFunction> + '_ {
        self.functions.iter().copied()
    }
}

impl Default for Builtins {
    fn default() -> Self {
        Self::standard()
    }
}

fn check_arity(args: &[Object], want: usize) -> Option<Object> {
    (args.len() != want).then(|| {
        Object::error(format!(
            "wrong number of arguments. got={}, want={want}",
            args.len()
        ))
    })
}

fn expect_array<'a>(name: &str, arg: &'a Object) -> Result<&'a [Object], Object> {
    match arg {
        Object::Array(elements) => Ok(elements),
        other => Err(Object::error(format!(
            "argument to `{name}` must be {}, got={}",
            ObjectType::Array,
            other.object_type()
        ))),
    }
}

fn len(args: &[Object]) -> Object {
    if let Some(error) = check_arity(args, 1) {
        return error;
    }
    match &args[0] {
        Object::String(value) => Object::Integer(value.chars().count() as i64),
        Object::Array(elements) => Object::Integer(elements.len() as i64),
        other => Object::error(format!(
            "argument to `len` not supported, got={}",
            other.object_type()
        )),
    }
}

fn unicode_len(args: &[Object]) -> Object {
    if let Some(error) = check_arity(args, 1) {
        return error;
    }
    match &args[0] {
        Object::String(value) => Object::Integer(value.len() as i64),
        other => Object::error(format!(
            "argument to `unicodeLen` not supported, got={}",
            other.object_type()
        )),
    }
}

fn first(args: &[Object]) -> Object {
    if let Some(error) = check_arity(args, 1) {
        return error;
    }
    match expect_array("first", &args[0]) {
        Ok(elements) => elements.first().cloned().unwrap_or(Object::Null),
        Err(error) => error,
    }
}

fn last(args: &[Object]) -> Object {
    if let Some(error) = check_arity(args, 1) {
        return error;
    }
    match expect_array("last", &args[0]) {
        Ok(elements) => elements.last().cloned().unwrap_or(Object::Null),
        Err(error) => error,
    }
}

fn rest(args: &[Object]) -> Object {
    if let Some(error) = check_arity(args, 1) {
        return error;
    }
    match expect_array("rest", &args[0]) {
        Ok([]) => Object::Null,
        Ok([_, tail @ ..]) => Object::Array(tail.to_vec()),
        Err(error) => error,
    }
}

fn push(args: &[Object]) -> Object {
    if let Some(error) = check_arity(args, 2) {
        return error;
    }
    match expect_array("push", &args[0]) {
        Ok(elements) => {
            let mut extended = elements.to_vec();
            extended.push(args[1].clone());
            Object::Array(extended)
        }
        Err(error) => error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(builtin: BuiltinFunction, args: Vec<Object>) -> Object {
        builtin.call(&args, &mut Vec::new())
    }

    fn array(values: &[i64]) -> Object {
        Object::Array(values.iter().copied().map(Object::Integer).collect())
    }

    #[test]
    fn len_counts_characters_and_elements() {
        assert_eq!(
            call(BuiltinFunction::Len, vec![Object::String("héllo".into())]),
            Object::Integer(5)
        );
        assert_eq!(
            call(BuiltinFunction::UnicodeLen, vec![Object::String("héllo".into())]),
            Object::Integer(6)
        );
        assert_eq!(call(BuiltinFunction::Len, vec![array(&[1, 2, 3])]), Object::Integer(3));
        assert_eq!(
            call(BuiltinFunction::Len, vec![Object::Integer(1)]),
            Object::error("argument to `len` not supported, got=INTEGER")
        );
        assert_eq!(
            call(
                BuiltinFunction::Len,
                vec![Object::String("one".into()), Object::String("two".into())]
            ),
            Object::error("wrong number of arguments. got=2, want=1")
        );
    }

    #[test]
    fn array_accessors() {
        assert_eq!(call(BuiltinFunction::First, vec![array(&[1, 2, 3])]), Object::Integer(1));
        assert_eq!(call(BuiltinFunction::Last, vec![array(&[1, 2, 3])]), Object::Integer(3));
        assert_eq!(call(BuiltinFunction::Rest, vec![array(&[1, 2, 3])]), array(&[2, 3]));
        assert_eq!(
            call(BuiltinFunction::Push, vec![array(&[1]), Object::Integer(2)]),
            array(&[1, 2])
        );
        assert_eq!(
            call(BuiltinFunction::First, vec![Object::Integer(1)]),
            Object::error("argument to `first` must be ARRAY, got=INTEGER")
        );
    }

    #[test]
    fn empty_array_accessors_return_null() {
        for builtin in [
            BuiltinFunction::First,
            BuiltinFunction::Last,
            BuiltinFunction::Rest,
        ] {
            assert_eq!(call(builtin, vec![array(&[])]), Object::Null);
        }
    }

    #[test]
    fn puts_writes_inspected_arguments() {
        let mut output = Vec::new();
        let result = BuiltinFunction::Puts.call(
            &[Object::Integer(1), Object::String("two".into())],
            &mut output,
        );
        assert_eq!(result, Object::Null);
        assert_eq!(output, vec!["1".to_string(), "two".to_string()]);
    }

    #[test]
    fn registry_indices_are_stable() {
        let builtins = Builtins::standard();
        let index = builtins.index_of("puts").expect("puts registered");
        assert_eq!(builtins.get(index), Some(BuiltinFunction::Puts));
        assert_eq!(builtins.lookup("nope"), None);
        assert_eq!(builtins.iter().count(), 7);
    }
}
