//! Generic text form of typed values.
//!
//! Used when a JSON value has to be assigned from a string, and by export for
//! every field that has no native JSON form.
//!
//! | Type      | Text form                              |
//! |-----------|----------------------------------------|
//! | bool      | `true` / `false` (also `yes`/`no`/`1`/`0` on parse) |
//! | integer   | `42`, or the enum name when enum-backed |
//! | enum      | `RED` or `Color::RED`, or the raw number |
//! | string    | raw at top level, `"quoted"` inside composites |
//! | array/set | `(a,b,c)`                              |
//! | map       | `((k1,v1),(k2,v2))`                    |
//! | record    | `(X=1,Y=2)`; top level also `X=1,Y=2`  |

use crate::coercion::{CoercionError, CoercionRegistry};
use crate::schema::{FieldDescriptor, RecordSchema, SchemaSet};
use crate::types::{FloatWidth, IntWidth, TypeTag};
use crate::values::{Record, Value, ValueMap, ValueSet};

/// Tag assumed for record fields missing from their schema.
static FALLBACK_TAG: TypeTag = TypeTag::String;

// ============================================================================
// Parsing
// ============================================================================

/// Parse the text form of a single value of type `tag`.
pub fn parse_value(
    text: &str,
    tag: &TypeTag,
    schemas: &SchemaSet,
    coercions: &CoercionRegistry,
) -> Result<Value, CoercionError> {
    if let Some(coercion) = coercions.lookup(tag) {
        return coercion.parse(text);
    }
    match tag {
        TypeTag::String | TypeTag::Custom(_) => Ok(Value::Text(text.to_string())),
        TypeTag::Record(name) => {
            let schema = record_schema(schemas, name)?;
            let trimmed = text.trim();
            let mut parser = TextParser::new(trimmed, schemas, coercions);
            let closed = trimmed.starts_with('(');
            if closed {
                parser.expect('(')?;
            }
            let record = parser.record_body(schema, closed)?;
            parser.finish()?;
            Ok(Value::Record(record))
        }
        _ => {
            let mut parser = TextParser::new(text.trim(), schemas, coercions);
            let value = parser.value(tag)?;
            parser.finish()?;
            Ok(value)
        }
    }
}

/// Parse the text form of a fixed-size field: `(a,b,c)`.
///
/// Missing trailing slots keep their default value.
pub fn parse_slots(
    text: &str,
    field: &FieldDescriptor,
    schemas: &SchemaSet,
    coercions: &CoercionRegistry,
) -> Result<Value, CoercionError> {
    let mut parser = TextParser::new(text.trim(), schemas, coercions);
    let slots = parser.slots(field)?;
    parser.finish()?;
    Ok(slots)
}

fn record_schema<'a>(schemas: &'a SchemaSet, name: &str) -> Result<&'a RecordSchema, CoercionError> {
    schemas
        .record(name)
        .ok_or_else(|| CoercionError::new(format!("unknown record type '{name}'")))
}

fn parse_bool(token: &str) -> Result<Value, CoercionError> {
    match token.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(Value::Bool(true)),
        "false" | "no" | "0" => Ok(Value::Bool(false)),
        _ => Err(CoercionError::new(format!("invalid boolean '{token}'"))),
    }
}

fn parse_int_text(token: &str) -> Option<i64> {
    let token = token.strip_prefix('+').unwrap_or(token);
    token
        .parse::<i64>()
        .ok()
        .or_else(|| token.parse::<u64>().ok().map(|u| u as i64))
}

fn enum_value(schemas: &SchemaSet, enum_name: &str, token: &str) -> Result<i64, CoercionError> {
    schemas
        .enum_def(enum_name)
        .and_then(|def| def.value_of(token))
        .ok_or_else(|| CoercionError::new(format!("invalid enum value '{token}' for '{enum_name}'")))
}

fn parse_integer(
    token: &str,
    width: IntWidth,
    signed: bool,
    enum_name: Option<&str>,
    schemas: &SchemaSet,
) -> Result<Value, CoercionError> {
    let raw = match (parse_int_text(token), enum_name) {
        (Some(raw), _) => raw,
        (None, Some(enum_name)) => enum_value(schemas, enum_name, token)?,
        (None, None) => return Err(CoercionError::new(format!("invalid integer '{token}'"))),
    };
    Ok(Value::Int(width.truncate(raw, signed)))
}

fn parse_float(
    token: &str,
    width: FloatWidth,
    enum_name: Option<&str>,
    schemas: &SchemaSet,
) -> Result<Value, CoercionError> {
    let raw = match (token.parse::<f64>(), enum_name) {
        (Ok(raw), _) => raw,
        (Err(_), Some(enum_name)) => enum_value(schemas, enum_name, token)? as f64,
        (Err(_), None) => return Err(CoercionError::new(format!("invalid number '{token}'"))),
    };
    Ok(Value::Float(width.narrow(raw)))
}

fn parse_enum(
    token: &str,
    enum_name: &str,
    width: IntWidth,
    schemas: &SchemaSet,
) -> Result<Value, CoercionError> {
    let raw = match parse_int_text(token) {
        Some(raw) => raw,
        None => enum_value(schemas, enum_name, token)?,
    };
    Ok(Value::Enum(width.truncate(raw, false)))
}

/// Recursive-descent parser over one text form.
struct TextParser<'a> {
    chars: Vec<char>,
    pos: usize,
    schemas: &'a SchemaSet,
    coercions: &'a CoercionRegistry,
}

impl<'a> TextParser<'a> {
    fn new(text: &str, schemas: &'a SchemaSet, coercions: &'a CoercionRegistry) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            schemas,
            coercions,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<(), CoercionError> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{c}'")))
        }
    }

    fn finish(&mut self) -> Result<(), CoercionError> {
        self.skip_ws();
        if self.at_end() {
            Ok(())
        } else {
            let rest: String = self.chars[self.pos..].iter().collect();
            Err(CoercionError::new(format!("unexpected trailing text '{rest}'")))
        }
    }

    fn error(&self, what: &str) -> CoercionError {
        match self.peek() {
            Some(c) => CoercionError::new(format!("{what} at position {}, found '{c}'", self.pos)),
            None => CoercionError::new(format!("{what} at end of text")),
        }
    }

    /// A quoted string, or an unquoted run up to the next `,` or `)`.
    fn token(&mut self) -> Result<String, CoercionError> {
        self.skip_ws();
        if self.peek() == Some('"') {
            return self.quoted();
        }
        let start = self.pos;
        while self.peek().is_some_and(|c| c != ',' && c != ')') {
            self.pos += 1;
        }
        Ok(self.chars[start..self.pos].iter().collect::<String>().trim().to_string())
    }

    fn quoted(&mut self) -> Result<String, CoercionError> {
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(CoercionError::new("unterminated quoted string")),
                Some('"') => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some('\\') => {
                    self.pos += 1;
                    let escaped = self
                        .peek()
                        .ok_or_else(|| CoercionError::new("unterminated quoted string"))?;
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                    self.pos += 1;
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    /// Raw text of the next item, handed to a registered coercion.
    fn raw_item(&mut self) -> Result<String, CoercionError> {
        self.skip_ws();
        match self.peek() {
            Some('"') => self.quoted(),
            Some('(') => {
                let start = self.pos;
                let mut depth = 0usize;
                let mut in_quotes = false;
                while let Some(c) = self.peek() {
                    self.pos += 1;
                    match c {
                        '\\' if in_quotes => self.pos += 1,
                        '"' => in_quotes = !in_quotes,
                        '(' if !in_quotes => depth += 1,
                        ')' if !in_quotes => {
                            depth -= 1;
                            if depth == 0 {
                                return Ok(self.chars[start..self.pos].iter().collect());
                            }
                        }
                        _ => {}
                    }
                }
                Err(CoercionError::new("unbalanced parentheses"))
            }
            _ => self.token(),
        }
    }

    fn value(&mut self, tag: &TypeTag) -> Result<Value, CoercionError> {
        if let Some(coercion) = self.coercions.lookup(tag) {
            let raw = self.raw_item()?;
            return coercion.parse(&raw);
        }
        match tag {
            TypeTag::Boolean => parse_bool(&self.token()?),
            TypeTag::Integer {
                width,
                signed,
                enum_name,
            } => parse_integer(&self.token()?, *width, *signed, enum_name.as_deref(), self.schemas),
            TypeTag::Float { width, enum_name } => {
                parse_float(&self.token()?, *width, enum_name.as_deref(), self.schemas)
            }
            TypeTag::Enum { enum_name, width } => {
                parse_enum(&self.token()?, enum_name, *width, self.schemas)
            }
            TypeTag::String | TypeTag::Custom(_) => Ok(Value::Text(self.token()?)),
            TypeTag::DynamicArray(element) => Ok(Value::Array(self.list(element)?)),
            TypeTag::Set(element) => {
                let mut set = ValueSet::new();
                for item in self.list(element)? {
                    set.insert(item);
                }
                Ok(Value::Set(set))
            }
            TypeTag::Map { key, value } => self.map(key, value),
            TypeTag::Record(name) => {
                let schema = record_schema(self.schemas, name)?;
                self.expect('(')?;
                Ok(Value::Record(self.record_body(schema, true)?))
            }
        }
    }

    fn list(&mut self, element: &TypeTag) -> Result<Vec<Value>, CoercionError> {
        self.expect('(')?;
        let mut items = Vec::new();
        if self.eat(')') {
            return Ok(items);
        }
        loop {
            items.push(self.value(element)?);
            if self.eat(',') {
                continue;
            }
            self.expect(')')?;
            return Ok(items);
        }
    }

    fn map(&mut self, key: &TypeTag, value: &TypeTag) -> Result<Value, CoercionError> {
        self.expect('(')?;
        let mut map = ValueMap::new();
        if self.eat(')') {
            return Ok(Value::Map(map));
        }
        loop {
            self.expect('(')?;
            let k = self.value(key)?;
            self.expect(',')?;
            let v = self.value(value)?;
            self.expect(')')?;
            map.insert(k, v);
            if self.eat(',') {
                continue;
            }
            self.expect(')')?;
            return Ok(Value::Map(map));
        }
    }

    fn slots(&mut self, field: &FieldDescriptor) -> Result<Value, CoercionError> {
        let mut items = self.list(&field.field_type)?;
        if items.len() > field.arity {
            return Err(CoercionError::new(format!(
                "'{}' holds {} values, got {}",
                field.name,
                field.arity,
                items.len()
            )));
        }
        let slot = Value::default_for(&field.field_type, self.schemas);
        items.resize(field.arity, slot);
        Ok(Value::Array(items))
    }

    fn field_name(&mut self) -> Result<String, CoercionError> {
        self.skip_ws();
        let start = self.pos;
        while self.peek().is_some_and(|c| c != '=' && c != ',' && c != ')') {
            self.pos += 1;
        }
        let name: String = self.chars[start..self.pos].iter().collect();
        if self.peek() != Some('=') {
            return Err(CoercionError::new(format!(
                "expected '=' after '{}'",
                name.trim()
            )));
        }
        Ok(name.trim().to_string())
    }

    /// `X=1,Y=2` up to the closing parenthesis (or the end of text when
    /// `closed` is false).
    fn record_body(&mut self, schema: &RecordSchema, closed: bool) -> Result<Record, CoercionError> {
        let mut record = Record::default_for(schema, self.schemas);
        loop {
            if closed && self.eat(')') {
                break;
            }
            self.skip_ws();
            if !closed && self.at_end() {
                break;
            }
            let name = self.field_name()?;
            let field = schema.field_ignore_case(&name).ok_or_else(|| {
                CoercionError::new(format!("unknown field '{name}' in '{}'", schema.name))
            })?;
            self.expect('=')?;
            let value = if field.is_fixed_array() {
                self.slots(field)?
            } else {
                self.value(&field.field_type)?
            };
            record.set(field.name.clone(), value);
            if self.eat(',') {
                continue;
            }
            if closed {
                self.expect(')')?;
            } else if !self.at_end() {
                return Err(self.error("expected ','"));
            }
            break;
        }
        Ok(record)
    }
}

// ============================================================================
// Formatting
// ============================================================================

/// Render a single value of type `tag` in its text form.
pub fn format_value(
    value: &Value,
    tag: &TypeTag,
    schemas: &SchemaSet,
    coercions: &CoercionRegistry,
) -> String {
    if let Some(coercion) = coercions.lookup(tag) {
        return coercion.format(value);
    }
    match value {
        Value::Text(s) => s.clone(),
        _ => {
            let mut out = String::new();
            TextWriter { schemas, coercions }.write(&mut out, value, tag);
            out
        }
    }
}

/// Render the slots of a fixed-size field: `(a,b,c)`.
pub fn format_slots(
    slots: &[Value],
    field: &FieldDescriptor,
    schemas: &SchemaSet,
    coercions: &CoercionRegistry,
) -> String {
    let mut out = String::new();
    TextWriter { schemas, coercions }.write_list(&mut out, slots.iter(), &field.field_type);
    out
}

/// Format a float so that it reads back at its declared width.
pub fn format_float(value: f64, width: FloatWidth) -> String {
    match width {
        FloatWidth::F32 => (value as f32).to_string(),
        FloatWidth::F64 => value.to_string(),
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

struct TextWriter<'a> {
    schemas: &'a SchemaSet,
    coercions: &'a CoercionRegistry,
}

impl TextWriter<'_> {
    fn enum_name(&self, tag: &TypeTag, value: i64) -> Option<&str> {
        tag.enum_backing()
            .and_then(|name| self.schemas.enum_def(name))
            .and_then(|def| def.name_of(value))
    }

    fn write(&self, out: &mut String, value: &Value, tag: &TypeTag) {
        if let Some(coercion) = self.coercions.lookup(tag) {
            out.push_str(&quote(&coercion.format(value)));
            return;
        }
        match value {
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Int(i) | Value::Enum(i) => match self.enum_name(tag, *i) {
                Some(name) => out.push_str(name),
                None => out.push_str(&i.to_string()),
            },
            Value::Float(f) => {
                let named = if f.fract() == 0.0 {
                    self.enum_name(tag, *f as i64)
                } else {
                    None
                };
                match (named, tag) {
                    (Some(name), _) => out.push_str(name),
                    (None, TypeTag::Float { width, .. }) => out.push_str(&format_float(*f, *width)),
                    (None, _) => out.push_str(&f.to_string()),
                }
            }
            Value::Text(s) => out.push_str(&quote(s)),
            Value::DateTime(dt) => out.push_str(&quote(&dt.to_rfc3339())),
            Value::Guid(g) => out.push_str(&g.to_string()),
            Value::Array(items) => self.write_list(out, items.iter(), element_of(tag)),
            Value::Set(set) => self.write_list(out, set.iter(), element_of(tag)),
            Value::Map(map) => {
                let (key_tag, value_tag) = match tag {
                    TypeTag::Map { key, value } => (key.as_ref(), value.as_ref()),
                    _ => (&FALLBACK_TAG, &FALLBACK_TAG),
                };
                out.push('(');
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push('(');
                    self.write(out, k, key_tag);
                    out.push(',');
                    self.write(out, v, value_tag);
                    out.push(')');
                }
                out.push(')');
            }
            Value::Record(record) => self.write_record(out, record),
        }
    }

    fn write_list<'v>(&self, out: &mut String, items: impl Iterator<Item = &'v Value>, element: &TypeTag) {
        out.push('(');
        for (i, item) in items.enumerate() {
            if i > 0 {
                out.push(',');
            }
            self.write(out, item, element);
        }
        out.push(')');
    }

    fn write_record(&self, out: &mut String, record: &Record) {
        let schema = self.schemas.record(record.type_name());
        out.push('(');
        for (i, (name, value)) in record.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(name);
            out.push('=');
            let tag = schema
                .and_then(|s| s.field(name))
                .map(|f| &f.field_type)
                .unwrap_or(&FALLBACK_TAG);
            self.write(out, value, tag);
        }
        out.push(')');
    }
}

fn element_of(tag: &TypeTag) -> &TypeTag {
    match tag {
        TypeTag::DynamicArray(element) | TypeTag::Set(element) => element,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::EnumDef;

    fn schemas() -> SchemaSet {
        SchemaSet::new(
            "Row",
            vec![
                RecordSchema::new(
                    "Vector",
                    vec![
                        FieldDescriptor::new("X", TypeTag::float()),
                        FieldDescriptor::new("Y", TypeTag::float()),
                        FieldDescriptor::new("Z", TypeTag::float()),
                    ],
                ),
                RecordSchema::new(
                    "Loot",
                    vec![
                        FieldDescriptor::new("Item", TypeTag::String),
                        FieldDescriptor::new("Weights", TypeTag::int32()).with_arity(2),
                        FieldDescriptor::new("Tint", TypeTag::enumeration("Color")),
                    ],
                ),
            ],
            vec![EnumDef::sequential("Color", ["RED", "GREEN", "BLUE"])],
        )
    }

    fn parse(text: &str, tag: &TypeTag) -> Result<Value, CoercionError> {
        parse_value(text, tag, &schemas(), &CoercionRegistry::new())
    }

    fn format(value: &Value, tag: &TypeTag) -> String {
        format_value(value, tag, &schemas(), &CoercionRegistry::new())
    }

    #[test]
    fn test_parse_scalars() {
        assert_eq!(parse("yes", &TypeTag::Boolean).unwrap(), Value::Bool(true));
        assert_eq!(parse("0", &TypeTag::Boolean).unwrap(), Value::Bool(false));
        assert!(parse("maybe", &TypeTag::Boolean).is_err());

        assert_eq!(parse(" 42 ", &TypeTag::int32()).unwrap(), Value::Int(42));
        assert_eq!(parse("300", &TypeTag::uint8()).unwrap(), Value::Int(44));
        assert!(parse("4.5", &TypeTag::int32()).is_err());

        assert_eq!(parse("1.5", &TypeTag::double()).unwrap(), Value::Float(1.5));
        assert_eq!(
            parse("green", &TypeTag::enumeration("Color")).unwrap(),
            Value::Enum(1)
        );
        assert_eq!(
            parse("BLUE", &TypeTag::enum_backed_byte("Color")).unwrap(),
            Value::Int(2)
        );
        assert!(parse("PINK", &TypeTag::enumeration("Color")).is_err());
    }

    #[test]
    fn test_strings_are_raw_at_top_level() {
        assert_eq!(
            parse(" a, b ", &TypeTag::String).unwrap(),
            Value::Text(" a, b ".to_string())
        );
        assert_eq!(format(&Value::Text("a, b".to_string()), &TypeTag::String), "a, b");
    }

    #[test]
    fn test_parse_record_forms() {
        let tag = TypeTag::record("Vector");
        let full = parse("(X=1,Y=2,Z=3)", &tag).unwrap();
        let bare = parse("x=1, y=2, z=3", &tag).unwrap();
        assert_eq!(full, bare);

        let partial = parse("(Y=5)", &tag).unwrap();
        let record = partial.as_record().unwrap();
        assert_eq!(record.get("X"), Some(&Value::Float(0.0)));
        assert_eq!(record.get("Y"), Some(&Value::Float(5.0)));

        let err = parse("X=1,Y=2,Z=3,W=4", &tag).unwrap_err();
        assert!(err.message.contains("unknown field 'W'"));
        assert!(parse("(X=1", &tag).is_err());
        assert!(parse("(X=1) extra", &tag).is_err());
    }

    #[test]
    fn test_record_with_fixed_slots_and_quoted_text() {
        let tag = TypeTag::record("Loot");
        let value = parse(r#"(Item="Sword, \"Sharp\"",Weights=(3),Tint=BLUE)"#, &tag).unwrap();
        let record = value.as_record().unwrap();
        assert_eq!(
            record.get("Item"),
            Some(&Value::Text("Sword, \"Sharp\"".to_string()))
        );
        assert_eq!(
            record.get("Weights"),
            Some(&Value::Array(vec![Value::Int(3), Value::Int(0)]))
        );
        assert_eq!(record.get("Tint"), Some(&Value::Enum(2)));

        assert_eq!(
            format(&value, &tag),
            r#"(Item="Sword, \"Sharp\"",Weights=(3,0),Tint=BLUE)"#
        );
        assert!(parse("(Weights=(1,2,3))", &tag).is_err());
    }

    #[test]
    fn test_containers() {
        let array = TypeTag::array(TypeTag::int32());
        let value = parse("(1, 2 ,3)", &array).unwrap();
        assert_eq!(
            value,
            Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
        assert_eq!(format(&value, &array), "(1,2,3)");
        assert_eq!(parse("()", &array).unwrap(), Value::Array(vec![]));

        let set = TypeTag::set(TypeTag::String);
        let value = parse(r#"("a","b","a")"#, &set).unwrap();
        assert_eq!(value.as_set().unwrap().len(), 2);

        let map = TypeTag::map(TypeTag::String, TypeTag::record("Vector"));
        let value = parse(r#"(("up",(Z=1)),("down",(Z=-1)))"#, &map).unwrap();
        let entries = value.as_map().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(
            format(&value, &map),
            r#"(("up",(X=0,Y=0,Z=1)),("down",(X=0,Y=0,Z=-1)))"#
        );
    }

    #[test]
    fn test_fixed_slots() {
        let field = FieldDescriptor::new("Tint", TypeTag::enumeration("Color")).with_arity(3);
        let value = parse_slots("(RED,BLUE)", &field, &schemas(), &CoercionRegistry::new()).unwrap();
        assert_eq!(
            value,
            Value::Array(vec![Value::Enum(0), Value::Enum(2), Value::Enum(0)])
        );
        let slots = value.as_array().unwrap();
        assert_eq!(
            format_slots(slots, &field, &schemas(), &CoercionRegistry::new()),
            "(RED,BLUE,RED)"
        );
    }

    #[test]
    fn test_format_float_width() {
        assert_eq!(format_float(0.1f32 as f64, FloatWidth::F32), "0.1");
        assert_eq!(format_float(2.0, FloatWidth::F64), "2");
    }

    #[test]
    fn test_format_unnamed_enum_value() {
        assert_eq!(format(&Value::Enum(7), &TypeTag::enumeration("Color")), "7");
        assert_eq!(format(&Value::Bool(true), &TypeTag::Boolean), "true");
    }
}
