//! Embedded SQL migrations for the principal store tables.
refinery::embed_migrations!("./src/schema");
