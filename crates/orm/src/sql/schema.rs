//! Schema Model to DDL

use crate::backends::{DatabaseValue, SqlDialect};
use crate::schema::{FieldDefinition, FieldType, ForeignKey, Schema, SchemaAction};

fn column_type(field_type: &FieldType, dialect: SqlDialect) -> String {
    match (field_type, dialect) {
        (FieldType::Increments, _) => dialect.auto_increment().to_string(),
        (FieldType::Integer, _) => "INTEGER".to_string(),
        (FieldType::BigInteger, _) => "BIGINT".to_string(),
        (FieldType::Float, SqlDialect::PostgreSQL) => "DOUBLE PRECISION".to_string(),
        (FieldType::Float, SqlDialect::MySQL) => "DOUBLE".to_string(),
        (FieldType::Float, SqlDialect::SQLite) => "REAL".to_string(),
        (FieldType::Boolean, SqlDialect::MySQL) => "TINYINT(1)".to_string(),
        (FieldType::Boolean, _) => "BOOLEAN".to_string(),
        (FieldType::String(length), _) => format!("VARCHAR({})", length.unwrap_or(255)),
        (FieldType::Text, _) => "TEXT".to_string(),
        (FieldType::Uuid, SqlDialect::PostgreSQL) => "UUID".to_string(),
        (FieldType::Uuid, _) => "CHAR(36)".to_string(),
        (FieldType::Timestamp, SqlDialect::PostgreSQL) => "TIMESTAMPTZ".to_string(),
        (FieldType::Timestamp, _) => "DATETIME".to_string(),
        (FieldType::Json, SqlDialect::PostgreSQL) => "JSONB".to_string(),
        (FieldType::Json, SqlDialect::MySQL) => "JSON".to_string(),
        (FieldType::Json, SqlDialect::SQLite) => "TEXT".to_string(),
        (FieldType::Binary, SqlDialect::PostgreSQL) => "BYTEA".to_string(),
        (FieldType::Binary, _) => "BLOB".to_string(),
    }
}

fn literal(value: &DatabaseValue, dialect: SqlDialect) -> String {
    match (value, dialect) {
        (DatabaseValue::Bool(b), SqlDialect::MySQL) => if *b { "1" } else { "0" }.to_string(),
        (DatabaseValue::Bool(b), _) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        (other, _) => other.to_string(),
    }
}

fn column_definition(field: &FieldDefinition, dialect: SqlDialect) -> String {
    let mut definition = format!(
        "{} {}",
        dialect.quote_identifier(&field.name),
        column_type(&field.field_type, dialect)
    );

    if field.field_type != FieldType::Increments {
        if !field.nullable {
            definition.push_str(" NOT NULL");
        }
        if field.identifier {
            definition.push_str(" PRIMARY KEY");
        } else if field.unique {
            definition.push_str(" UNIQUE");
        }
    }
    if let Some(default) = &field.default {
        definition.push_str(&format!(" DEFAULT {}", literal(default, dialect)));
    }
    definition
}

fn foreign_key(entity: &str, reference: &ForeignKey, dialect: SqlDialect) -> String {
    format!(
        "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON UPDATE {} ON DELETE {}",
        dialect.quote_identifier(&reference.constraint_name(entity)),
        dialect.quote_identifier(&reference.field),
        dialect.quote_identifier(&reference.referenced_entity),
        dialect.quote_identifier(&reference.referenced_field),
        reference.on_update,
        reference.on_delete
    )
}

fn unique_constraint(entity: &str, columns: &[String], dialect: SqlDialect) -> String {
    let quoted: Vec<String> = columns.iter().map(|c| dialect.quote_identifier(c)).collect();
    format!(
        "CONSTRAINT {} UNIQUE ({})",
        dialect.quote_identifier(&format!("{}_{}_unique", entity, columns.join("_"))),
        quoted.join(", ")
    )
}

/// Render a schema change as one or more DDL statements
pub fn render_schema(schema: &Schema, dialect: SqlDialect) -> Vec<String> {
    let entity = schema.entity();
    let table = dialect.quote_identifier(entity);

    match schema.action {
        SchemaAction::Create => {
            let mut parts: Vec<String> = schema
                .add_fields
                .iter()
                .map(|f| column_definition(f, dialect))
                .collect();
            parts.extend(
                schema
                    .unique_constraints
                    .iter()
                    .map(|columns| unique_constraint(entity, columns, dialect)),
            );
            parts.extend(
                schema
                    .add_references
                    .iter()
                    .map(|r| foreign_key(entity, r, dialect)),
            );
            vec![format!("CREATE TABLE {} ({})", table, parts.join(", "))]
        }
        SchemaAction::Alter => {
            let mut statements = Vec::new();
            for field in &schema.remove_references {
                let name = dialect.quote_identifier(&format!("{}_{}_foreign", entity, field));
                statements.push(match dialect {
                    SqlDialect::MySQL => format!("ALTER TABLE {} DROP FOREIGN KEY {}", table, name),
                    _ => format!("ALTER TABLE {} DROP CONSTRAINT {}", table, name),
                });
            }
            for name in &schema.remove_fields {
                statements.push(format!(
                    "ALTER TABLE {} DROP COLUMN {}",
                    table,
                    dialect.quote_identifier(name)
                ));
            }
            for field in &schema.add_fields {
                statements.push(format!(
                    "ALTER TABLE {} ADD COLUMN {}",
                    table,
                    column_definition(field, dialect)
                ));
            }
            for columns in &schema.unique_constraints {
                statements.push(format!(
                    "ALTER TABLE {} ADD {}",
                    table,
                    unique_constraint(entity, columns, dialect)
                ));
            }
            for reference in &schema.add_references {
                statements.push(format!(
                    "ALTER TABLE {} ADD {}",
                    table,
                    foreign_key(entity, reference, dialect)
                ));
            }
            statements
        }
        SchemaAction::Drop => vec![format!("DROP TABLE {}", table)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ReferentialAction;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_create_table_ddl() {
        let schema = Schema::create("posts", |t| {
            t.increments("id");
            t.string("title", Some(120)).unique();
            t.boolean("published").default(false);
            t.integer("user_id");
            t.foreign("user_id")
                .references("users", "id")
                .on(ReferentialAction::Cascade);
            t.timestamp("deleted_at").nullable();
        });

        let statements = render_schema(&schema, SqlDialect::PostgreSQL);
        assert_eq!(
            statements,
            vec![
                "CREATE TABLE \"posts\" (\"id\" SERIAL PRIMARY KEY, \"title\" VARCHAR(120) NOT NULL UNIQUE, \"published\" BOOLEAN NOT NULL DEFAULT FALSE, \"user_id\" INTEGER NOT NULL, \"deleted_at\" TIMESTAMPTZ, CONSTRAINT \"posts_user_id_foreign\" FOREIGN KEY (\"user_id\") REFERENCES \"users\" (\"id\") ON UPDATE CASCADE ON DELETE CASCADE)".to_string()
            ]
        );
    }

    #[test]
    fn test_alter_table_ddl() {
        let schema = Schema::alter("posts", |t| {
            t.drop_foreign("user_id");
            t.drop_column("user_id");
            t.text("body").nullable();
        });

        let statements = render_schema(&schema, SqlDialect::PostgreSQL);
        assert_eq!(
            statements,
            vec![
                "ALTER TABLE \"posts\" DROP CONSTRAINT \"posts_user_id_foreign\"".to_string(),
                "ALTER TABLE \"posts\" DROP COLUMN \"user_id\"".to_string(),
                "ALTER TABLE \"posts\" ADD COLUMN \"body\" TEXT".to_string(),
            ]
        );
    }
}
