//! Parser for `.shape` definition files.

mod grammar;

use std::path::Path;

use pest::Parser;
use pest::error::InputLocation;
use pest::iterators::{Pair, Pairs};
use smol_str::SmolStr;

use crate::ast::*;
use crate::error::{SchemaError, SchemaResult};

pub use grammar::{Rule, ShapeParser};

/// Parse a definition document from a string.
pub fn parse_document(input: &str) -> SchemaResult<Document> {
    let mut pairs = ShapeParser::parse(Rule::document, input).map_err(|e| {
        let (offset, len) = match &e.location {
            InputLocation::Pos(pos) => (*pos, 0),
            InputLocation::Span((start, end)) => (*start, end - start),
        };
        SchemaError::syntax(input, offset, len, e.variant.message().to_string())
    })?;

    let ctx = Ctx { input };
    let root = pairs
        .next()
        .ok_or_else(|| SchemaError::syntax(input, 0, input.len(), "empty parse result"))?;

    let mut doc = Document::new();
    let mut current_doc: Option<Documentation> = None;

    for pair in root.into_inner() {
        match pair.as_rule() {
            Rule::documentation => current_doc = Some(documentation(pair)),
            Rule::model_def => {
                let mut model = ctx.model(pair)?;
                if let Some(d) = current_doc.take() {
                    model = model.with_documentation(d);
                }
                doc.add_model(model);
            }
            Rule::schema_def => {
                let mut schema = ctx.schema(pair)?;
                if let Some(d) = current_doc.take() {
                    schema = schema.with_documentation(d);
                }
                doc.add_schema(schema);
            }
            _ => {}
        }
    }

    Ok(doc)
}

/// Parse a definition document from a file.
pub fn parse_document_file(path: impl AsRef<Path>) -> SchemaResult<Document> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| SchemaError::IoError {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_document(&content)
}

fn span_of(pair: &Pair<'_, Rule>) -> Span {
    Span::new(pair.as_span().start(), pair.as_span().end())
}

fn documentation(pair: Pair<'_, Rule>) -> Documentation {
    let span = span_of(&pair);
    let text = pair
        .into_inner()
        .map(|p| p.as_str().trim_start_matches("///").trim())
        .collect::<Vec<_>>()
        .join("\n");
    Documentation::new(text, span)
}

/// Parse context; carries the source so malformed trees report a location.
struct Ctx<'i> {
    input: &'i str,
}

impl<'i> Ctx<'i> {
    fn malformed(&self, span: Span, message: impl Into<String>) -> SchemaError {
        SchemaError::syntax(self.input, span.start, span.len(), message)
    }

    fn next(
        &self,
        inner: &mut Pairs<'i, Rule>,
        parent: Span,
        what: &str,
    ) -> SchemaResult<Pair<'i, Rule>> {
        inner
            .next()
            .ok_or_else(|| self.malformed(parent, format!("expected {what}")))
    }

    /// Consume the leading keyword pair of a declaration.
    fn keyword(&self, inner: &mut Pairs<'i, Rule>, parent: Span, rule: Rule) -> SchemaResult<()> {
        let pair = self.next(inner, parent, "keyword")?;
        if pair.as_rule() == rule {
            Ok(())
        } else {
            Err(self.malformed(span_of(&pair), format!("expected {rule:?}")))
        }
    }

    fn model(&self, pair: Pair<'i, Rule>) -> SchemaResult<Model> {
        let span = span_of(&pair);
        let mut inner = pair.into_inner();
        self.keyword(&mut inner, span, Rule::kw_model)?;
        let name = self.next(&mut inner, span, "model name")?;

        let mut model = Model::new(name.as_str());
        model.span = span;

        for item in inner {
            match item.as_rule() {
                Rule::member_def => self.member(&mut model, item)?,
                Rule::block_attribute => {
                    let attr = self.attribute(item)?;
                    match attr.name() {
                        "table" => {
                            let table = ident_arg(&attr)?;
                            model = model.with_table(table);
                        }
                        _ => {
                            return Err(SchemaError::invalid_attribute(
                                attr.name(),
                                "not valid on a model",
                            ));
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(model)
    }

    /// A model member is a column when its type is a scalar, a relation otherwise.
    fn member(&self, model: &mut Model, pair: Pair<'i, Rule>) -> SchemaResult<()> {
        let span = span_of(&pair);
        let mut inner = pair.into_inner();
        let name = SmolStr::new(self.next(&mut inner, span, "member name")?.as_str());
        let type_ref = self.next(&mut inner, span, "member type")?;

        let mut type_parts = type_ref.into_inner();
        let type_name = self.next(&mut type_parts, span, "type name")?.as_str();
        let modifier = type_parts.next().map(|p| p.as_str());

        let attrs = inner
            .filter(|p| p.as_rule() == Rule::field_attribute)
            .map(|p| self.attribute(p))
            .collect::<SchemaResult<Vec<_>>>()?;

        if let Some(scalar) = ScalarType::from_str(type_name) {
            if modifier == Some("[]") {
                return Err(self.malformed(span, "scalar columns cannot be lists"));
            }
            let mut column = Column::new(name, scalar).with_span(span);
            for attr in &attrs {
                match attr.name() {
                    "id" => column = column.id(),
                    "foreign" => column = column.foreign(),
                    other => {
                        return Err(SchemaError::invalid_attribute(other, "not valid on a column"));
                    }
                }
            }
            model.add_column(column);
            return Ok(());
        }

        let cardinality = if modifier == Some("[]") {
            Cardinality::Many
        } else {
            Cardinality::One
        };

        let mut join = None;
        let mut conditions = Vec::new();
        for attr in &attrs {
            match attr.name() {
                "relation" => join = Some(relation_join(attr)?),
                "where" => {
                    conditions.extend(
                        attr.named_args()
                            .map(|(col, value)| (SmolStr::new(col), value.to_json())),
                    );
                }
                other => {
                    return Err(SchemaError::invalid_attribute(
                        other,
                        "not valid on a relation",
                    ));
                }
            }
        }

        // Without `@relation`, lists reference the owner through `<owner>_id`
        // and single relations hold a `<relation>_id` foreign key.
        let join = join.unwrap_or_else(|| match cardinality {
            Cardinality::Many => Join::Referenced {
                remote: SmolStr::new(format!("{}_id", model.name.to_lowercase())),
            },
            Cardinality::One => Join::ForeignKey {
                local: SmolStr::new(format!("{}_id", name)),
            },
        });

        let mut relation = ModelRelation::new(name, type_name, join)
            .with_cardinality(cardinality)
            .with_span(span);
        for (column, value) in conditions {
            relation = relation.with_condition(column, value);
        }
        model.add_relation(relation);
        Ok(())
    }

    fn schema(&self, pair: Pair<'i, Rule>) -> SchemaResult<SchemaDef> {
        let span = span_of(&pair);
        let mut inner = pair.into_inner();
        self.keyword(&mut inner, span, Rule::kw_schema)?;
        let name = self.next(&mut inner, span, "schema name")?;

        let mut schema = SchemaDef::new(name.as_str());
        schema.span = span;

        for item in inner {
            match item.as_rule() {
                Rule::schema_model => {
                    let mut parts = item.into_inner();
                    self.keyword(&mut parts, span, Rule::kw_for)?;
                    let model = self.next(&mut parts, span, "model name")?;
                    schema.model = Some(SmolStr::new(model.as_str()));
                }
                Rule::schema_base => {
                    let mut parts = item.into_inner();
                    self.keyword(&mut parts, span, Rule::kw_extends)?;
                    let base = self.next(&mut parts, span, "base schema")?;
                    schema.extends = Some(SmolStr::new(base.as_str()));
                }
                Rule::schema_field => {
                    let field = self.schema_field(item)?;
                    schema.add_field(field);
                }
                Rule::block_attribute => {
                    let attr = self.attribute(item)?;
                    match attr.name() {
                        "fields" => schema.options.fields = Some(ident_list_arg(&attr)?),
                        "exclude" => schema.options.exclude.extend(ident_list_arg(&attr)?),
                        "include_fk" => schema.options.include_fk = true,
                        "no_auto_fields" => schema.options.auto_fields = false,
                        other => {
                            return Err(SchemaError::invalid_attribute(
                                other,
                                "not valid on a schema",
                            ));
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(schema)
    }

    fn schema_field(&self, pair: Pair<'i, Rule>) -> SchemaResult<FieldDef> {
        let span = span_of(&pair);
        let mut inner = pair.into_inner().peekable();
        let name = self.next_peekable(&mut inner, span)?;

        let mut field = match inner.peek().map(|p| p.as_rule()) {
            Some(Rule::field_target) => {
                let target = self.next_peekable(&mut inner, span)?;
                self.nested_field(name.as_str(), target)?
            }
            _ => FieldDef::scalar(name.as_str()),
        };
        field.span = span;

        for attr_pair in inner {
            let attr = self.attribute(attr_pair)?;
            let nested = field.is_nested();
            field = match attr.name() {
                "attribute" => field.attribute(ident_arg(&attr)?),
                "load_only" => field.load_only(),
                "only" if nested => field.only(ident_list_arg(&attr)?),
                "exclude" if nested => field.exclude(ident_list_arg(&attr)?),
                "single" if nested => field.single(),
                "many" if nested => field.many(),
                "only" | "exclude" | "single" | "many" => {
                    return Err(SchemaError::invalid_attribute(
                        attr.name(),
                        "only applies to nested fields",
                    ));
                }
                other => {
                    return Err(SchemaError::invalid_attribute(
                        other,
                        "not valid on a schema field",
                    ));
                }
            };
        }

        Ok(field)
    }

    fn next_peekable(
        &self,
        inner: &mut std::iter::Peekable<Pairs<'i, Rule>>,
        parent: Span,
    ) -> SchemaResult<Pair<'i, Rule>> {
        inner
            .next()
            .ok_or_else(|| self.malformed(parent, "truncated field declaration"))
    }

    fn nested_field(&self, name: &str, target: Pair<'i, Rule>) -> SchemaResult<FieldDef> {
        let span = span_of(&target);
        let inner = self.next(&mut target.into_inner(), span, "field target")?;

        let (target, many) = match inner.as_rule() {
            Rule::list_target => {
                let item = self.next(&mut inner.into_inner(), span, "list item")?;
                (item, true)
            }
            _ => (inner, false),
        };

        let field = match target.as_rule() {
            Rule::self_target => FieldDef::self_ref(name),
            _ => FieldDef::nested(name, target.as_str().trim()),
        };

        Ok(if many { field.many() } else { field })
    }

    fn attribute(&self, pair: Pair<'i, Rule>) -> SchemaResult<Attribute> {
        let span = span_of(&pair);
        let mut inner = pair.into_inner();
        let name_pair = self.next(&mut inner, span, "attribute name")?;
        let name = Ident::new(name_pair.as_str(), span_of(&name_pair));

        let mut args = vec![];
        for item in inner {
            if item.as_rule() == Rule::attribute_args {
                for arg in item.into_inner() {
                    args.push(self.attribute_arg(arg)?);
                }
            }
        }

        Ok(Attribute::new(name, args, span))
    }

    fn attribute_arg(&self, pair: Pair<'i, Rule>) -> SchemaResult<AttributeArg> {
        let span = span_of(&pair);
        let mut inner = pair.into_inner();
        let first = self.next(&mut inner, span, "attribute argument")?;

        match inner.next() {
            Some(value) => {
                let name = Ident::new(first.as_str(), span_of(&first));
                Ok(AttributeArg::named(name, self.value(value)?, span))
            }
            None => Ok(AttributeArg::positional(self.value(first)?, span)),
        }
    }

    fn value(&self, pair: Pair<'i, Rule>) -> SchemaResult<AttributeValue> {
        let span = span_of(&pair);
        match pair.as_rule() {
            Rule::string_literal => {
                let s = pair.as_str();
                Ok(AttributeValue::String(s[1..s.len() - 1].to_string()))
            }
            Rule::number_literal => {
                let s = pair.as_str();
                if s.contains('.') {
                    s.parse()
                        .map(AttributeValue::Float)
                        .map_err(|_| self.malformed(span, "invalid float"))
                } else {
                    s.parse()
                        .map(AttributeValue::Int)
                        .map_err(|_| self.malformed(span, "integer out of range"))
                }
            }
            Rule::boolean_literal => Ok(AttributeValue::Boolean(pair.as_str() == "true")),
            Rule::array_literal => pair
                .into_inner()
                .map(|p| self.value(p))
                .collect::<SchemaResult<Vec<_>>>()
                .map(AttributeValue::Array),
            _ => Ok(AttributeValue::Ident(SmolStr::new(pair.as_str()))),
        }
    }
}

fn ident_arg(attr: &Attribute) -> SchemaResult<SmolStr> {
    attr.first_arg()
        .and_then(AttributeValue::as_ident)
        .map(SmolStr::new)
        .ok_or_else(|| SchemaError::invalid_attribute(attr.name(), "expected a name"))
}

fn ident_list_arg(attr: &Attribute) -> SchemaResult<Vec<SmolStr>> {
    attr.first_arg()
        .and_then(AttributeValue::as_ident_list)
        .ok_or_else(|| SchemaError::invalid_attribute(attr.name(), "expected a list of names"))
}

fn named_ident(attr: &Attribute, name: &str) -> SchemaResult<Option<SmolStr>> {
    match attr.get_arg(name) {
        None => Ok(None),
        Some(value) => value
            .as_ident_list()
            .and_then(|list| list.into_iter().next())
            .map(Some)
            .ok_or_else(|| {
                SchemaError::invalid_attribute(attr.name(), format!("`{name}` expects a column"))
            }),
    }
}

/// Interpret `@relation(...)`.
///
/// - `fields: [fk]` (or `local: fk`) alone: foreign key on the owner
/// - `remote: col` alone: column on the target referencing the owner
/// - `through: Link, local: a, remote: b`: many-to-many via a link model
fn relation_join(attr: &Attribute) -> SchemaResult<Join> {
    let through = named_ident(attr, "through")?;
    let fields = named_ident(attr, "fields")?;
    let local = named_ident(attr, "local")?;
    let remote = named_ident(attr, "remote")?;

    match (through, fields.or(local), remote) {
        (Some(link), Some(local), Some(remote)) => Ok(Join::Through {
            link,
            local,
            remote,
        }),
        (Some(_), _, _) => Err(SchemaError::invalid_attribute(
            "relation",
            "`through` requires both `local` and `remote`",
        )),
        (None, Some(local), None) => Ok(Join::ForeignKey { local }),
        (None, None, Some(remote)) => Ok(Join::Referenced { remote }),
        (None, Some(_), Some(_)) => Err(SchemaError::invalid_attribute(
            "relation",
            "give either a local foreign key or a remote column, not both",
        )),
        (None, None, None) => Err(SchemaError::invalid_attribute(
            "relation",
            "expected `fields`, `local`, `remote` or `through`",
        )),
    }
}
