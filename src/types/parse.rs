//! Recursive-descent parser for Go type expressions.
//!
//! Covers what a type declaration's right-hand side can spell without
//! generics: named and package-qualified types, pointers, slices, arrays,
//! maps, channels (all three directions), inline structs, and function and
//! interface types (kept as raw text).
use super::{ChanDir, FieldDecl, TypeExpr};
use crate::error::{Error, Result};

pub fn parse_type_expr(src: &str) -> Result<TypeExpr> {
    let mut p = Parser { src, pos: 0 };
    let ty = p.parse_type()?;
    p.skip_ws();
    if p.pos != src.len() {
        return Err(p.error("unexpected trailing input"));
    }
    Ok(ty)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::TypeSyntax {
            text: self.src.to_string(),
            offset: self.pos,
            message: message.into(),
        }
    }

    /// Skips whitespace; reports whether a newline was crossed.
    fn skip_ws(&mut self) -> bool {
        let mut newline = false;
        while let Some(c) = self.rest().chars().next() {
            if !c.is_whitespace() {
                break;
            }
            newline |= c == '\n';
            self.pos += c.len_utf8();
        }
        newline
    }

    fn eat(&mut self, punct: &str) -> bool {
        self.skip_ws();
        if self.rest().starts_with(punct) {
            self.pos += punct.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: &str) -> Result<()> {
        if self.eat(punct) {
            Ok(())
        } else {
            Err(self.error(format!("expected `{punct}`")))
        }
    }

    fn peek_is(&mut self, punct: &str) -> bool {
        self.skip_ws();
        self.rest().starts_with(punct)
    }

    fn ident(&mut self) -> Option<&'a str> {
        self.skip_ws();
        let rest = self.rest();
        if !rest.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_') {
            return None;
        }
        let len = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        self.pos += len;
        Some(&rest[..len])
    }

    fn expect_ident(&mut self) -> Result<&'a str> {
        self.ident().ok_or_else(|| self.error("expected identifier"))
    }

    fn parse_type(&mut self) -> Result<TypeExpr> {
        if self.eat("*") {
            return Ok(TypeExpr::Pointer(Box::new(self.parse_type()?)));
        }
        if self.eat("<-") {
            if self.expect_ident()? != "chan" {
                return Err(self.error("expected `chan` after `<-`"));
            }
            let elem = self.parse_type()?;
            return Ok(TypeExpr::Chan { dir: ChanDir::Recv, elem: Box::new(elem) });
        }
        if self.eat("[") {
            if self.eat("]") {
                return Ok(TypeExpr::Slice(Box::new(self.parse_type()?)));
            }
            let len = self.take_until(']')?.trim().to_string();
            if len.is_empty() {
                return Err(self.error("empty array length"));
            }
            self.expect("]")?;
            let elem = self.parse_type()?;
            return Ok(TypeExpr::Array { len, elem: Box::new(elem) });
        }
        if self.eat("(") {
            let inner = self.parse_type()?;
            self.expect(")")?;
            return Ok(inner);
        }

        match self.expect_ident()? {
            "map" => {
                self.expect("[")?;
                let key = self.parse_type()?;
                self.expect("]")?;
                let val = self.parse_type()?;
                Ok(TypeExpr::Map { key: Box::new(key), val: Box::new(val) })
            }
            "chan" => {
                let dir = if self.eat("<-") { ChanDir::Send } else { ChanDir::Both };
                let elem = self.parse_type()?;
                Ok(TypeExpr::Chan { dir, elem: Box::new(elem) })
            }
            "struct" => {
                self.expect("{")?;
                Ok(TypeExpr::Struct(self.parse_fields()?))
            }
            "interface" => {
                self.expect("{")?;
                let inner = self.take_balanced_body()?;
                if inner.trim().is_empty() {
                    Ok(TypeExpr::Interface("interface{}".to_string()))
                } else {
                    Ok(TypeExpr::Interface(format!("interface{{ {} }}", inner.trim())))
                }
            }
            "func" => {
                let start = self.pos;
                self.skip_signature();
                let sig = self.src[start..self.pos].trim_end();
                Ok(TypeExpr::Func(format!("func{sig}")))
            }
            first => {
                if self.rest().starts_with('.') {
                    self.pos += 1;
                    let name = self.expect_ident()?;
                    Ok(TypeExpr::Named { pkg: Some(first.to_string()), name: name.to_string() })
                } else {
                    Ok(TypeExpr::named(first))
                }
            }
        }
    }

    /// Fields of an inline struct, up to and including the closing brace.
    fn parse_fields(&mut self) -> Result<Vec<FieldDecl>> {
        let mut fields = Vec::new();
        loop {
            if self.eat("}") {
                return Ok(fields);
            }
            if self.eat(";") {
                continue;
            }
            if self.peek_is("*") {
                let ty = self.parse_type()?;
                fields.push(self.embedded(ty)?);
            } else {
                let first = self.expect_ident()?;
                let newline = self.skip_ws();
                let rest = self.rest();
                if rest.starts_with('.') {
                    self.pos += 1;
                    let name = self.expect_ident()?;
                    let ty = TypeExpr::Named { pkg: Some(first.to_string()), name: name.to_string() };
                    fields.push(self.embedded(ty)?);
                } else if newline || rest.is_empty() || rest.starts_with(';') || rest.starts_with('}') || rest.starts_with('`') || rest.starts_with('"') {
                    fields.push(self.embedded(TypeExpr::named(first))?);
                } else {
                    let mut names = vec![first];
                    while self.eat(",") {
                        names.push(self.expect_ident()?);
                    }
                    let ty = self.parse_type()?;
                    for name in names {
                        fields.push(FieldDecl { name: name.to_string(), ty: ty.clone(), embedded: false });
                    }
                }
            }
            self.skip_tag()?;
        }
    }

    fn embedded(&self, ty: TypeExpr) -> Result<FieldDecl> {
        let name = FieldDecl::embedded_name(&ty)
            .ok_or_else(|| self.error("embedded field must be a type name or pointer to one"))?;
        Ok(FieldDecl { name, ty, embedded: true })
    }

    fn skip_tag(&mut self) -> Result<()> {
        self.skip_ws();
        let Some(quote) = self.rest().chars().next().filter(|c| *c == '`' || *c == '"') else {
            return Ok(());
        };
        self.pos += 1;
        let mut escaped = false;
        for (i, c) in self.rest().char_indices() {
            if c == quote && !escaped {
                self.pos += i + 1;
                return Ok(());
            }
            escaped = quote == '"' && c == '\\' && !escaped;
        }
        Err(self.error("unterminated struct tag"))
    }

    fn take_until(&mut self, stop: char) -> Result<&'a str> {
        let rest = self.rest();
        let end = rest.find(stop).ok_or_else(|| self.error(format!("expected `{stop}`")))?;
        self.pos += end;
        Ok(&rest[..end])
    }

    /// Consumes up to the brace matching an already consumed `{`.
    fn take_balanced_body(&mut self) -> Result<&'a str> {
        let rest = self.rest();
        let mut depth = 0usize;
        for (i, c) in rest.char_indices() {
            match c {
                '{' => depth += 1,
                '}' if depth == 0 => {
                    self.pos += i + 1;
                    return Ok(&rest[..i]);
                }
                '}' => depth -= 1,
                _ => {}
            }
        }
        Err(self.error("unbalanced `{`"))
    }

    /// A func signature runs until an unbalanced closer or field separator.
    fn skip_signature(&mut self) {
        let rest = self.rest();
        let mut depth = 0usize;
        for (i, c) in rest.char_indices() {
            match c {
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' if depth == 0 => {
                    self.pos += i;
                    return;
                }
                ')' | ']' | '}' => depth -= 1,
                ';' | '\n' | '`' | '"' if depth == 0 => {
                    self.pos += i;
                    return;
                }
                _ => {}
            }
        }
        self.pos = self.src.len();
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn named(name: &str) -> TypeExpr {
        TypeExpr::named(name)
    }

    #[test]
    fn nested_containers() {
        let ty = parse_type_expr("map[string][]*Bar").unwrap();
        assert_eq!(
            ty,
            TypeExpr::Map {
                key: Box::new(named("string")),
                val: Box::new(TypeExpr::Slice(Box::new(TypeExpr::pointer(named("Bar"))))),
            }
        );
    }

    #[test]
    fn channel_directions() {
        let recv = parse_type_expr("<-chan int").unwrap();
        let send = parse_type_expr("chan<- int").unwrap();
        let both = parse_type_expr("chan int").unwrap();
        assert!(matches!(recv, TypeExpr::Chan { dir: ChanDir::Recv, .. }));
        assert!(matches!(send, TypeExpr::Chan { dir: ChanDir::Send, .. }));
        assert!(matches!(both, TypeExpr::Chan { dir: ChanDir::Both, .. }));
    }

    #[test]
    fn inline_struct_with_embedded_tags_and_grouped_names() {
        let ty = parse_type_expr(
            "struct {\n\tBase\n\t*log.Logger\n\tX, Y float64 `json:\"xy\"`\n\tcb func(int) error\n}",
        )
        .unwrap();
        let TypeExpr::Struct(fields) = ty else { panic!("not a struct") };
        let names: Vec<_> = fields.iter().map(|f| (f.name.as_str(), f.embedded)).collect();
        assert_eq!(
            names,
            vec![("Base", true), ("Logger", true), ("X", false), ("Y", false), ("cb", false)]
        );
        assert_eq!(fields[4].ty, TypeExpr::Func("func(int) error".to_string()));
    }

    #[test]
    fn arrays_keep_their_length_text() {
        let ty = parse_type_expr("[N*2]byte").unwrap();
        assert_eq!(ty, TypeExpr::Array { len: "N*2".into(), elem: Box::new(named("byte")) });
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        let err = parse_type_expr("[]int]").unwrap_err();
        assert!(matches!(err, Error::TypeSyntax { offset: 5, .. }), "{err:?}");
    }

    #[test]
    fn interface_text_is_preserved() {
        assert_eq!(parse_type_expr("interface{}").unwrap(), TypeExpr::Interface("interface{}".into()));
        assert_eq!(
            parse_type_expr("interface { String() string }").unwrap(),
            TypeExpr::Interface("interface{ String() string }".into())
        );
    }
}
