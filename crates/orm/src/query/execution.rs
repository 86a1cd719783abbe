//! Query Builder execution
//!
//! Every execution works on a copy of the accumulated query with the
//! soft-delete policy applied, so the builder stays reusable.

use std::future::Future;

use tracing::debug;

use crate::backends::{DatabaseValue, Record};
use crate::error::{ModelError, OrmResult};
use crate::loading::eager_loader::EagerLoader;
use crate::loading::{EagerLoadCache, Loaded};
use crate::model::FromRow;

use super::builder::QueryBuilder;
use super::statement::Query;
use super::where_clause::FilterBuilder;
use super::with::soft_delete_filter;

impl<M> QueryBuilder<M> {
    /// The query as it will execute, with the soft-delete filter injected
    pub fn prepared(&self) -> Query {
        let mut query = self.query.clone();
        if let Some(column) = &self.soft_delete_column {
            let column = if query.joins.is_empty() {
                column.clone()
            } else {
                format!("{}.{}", query.entity(), column)
            };
            query.filters.extend(soft_delete_filter(&column, self.scope));
        }
        query
    }
}

impl<M: FromRow> QueryBuilder<M> {
    /// Execute and decode every row, loading the relations requested with `with`
    pub async fn run(&self) -> OrmResult<Vec<Loaded<M>>> {
        let records = self.db.fetch_all(self.prepared()).await?;
        self.hydrate(records).await
    }

    /// Execute and return the bare models
    pub async fn all(&self) -> OrmResult<Vec<M>> {
        Ok(self.run().await?.into_iter().map(Loaded::into_inner).collect())
    }

    /// First row, honoring any offset already set
    pub async fn first(&self) -> OrmResult<Option<Loaded<M>>> {
        Ok(self.copy().limit(1).run().await?.into_iter().next())
    }

    pub async fn first_or_fail(&self) -> OrmResult<Loaded<M>> {
        self.first()
            .await?
            .ok_or_else(|| ModelError::NotFound(self.entity().to_string()))
    }

    /// Row whose identifier equals `id`
    pub async fn find<K: Into<DatabaseValue>>(&self, id: K) -> OrmResult<Option<Loaded<M>>> {
        let key = self.primary_key.clone();
        self.copy().where_eq(&key, id).first().await
    }

    pub async fn exists(&self) -> OrmResult<bool> {
        let query = self.copy().limit(1).prepared();
        Ok(!self.db.fetch_all(query).await?.is_empty())
    }

    /// Values of one field across the result
    pub async fn pluck(&self, field: &str) -> OrmResult<Vec<DatabaseValue>> {
        let mut query = self.prepared();
        query.fields = vec![field.to_string()];
        let column = field.rsplit('.').next().unwrap_or(field);
        Ok(self
            .db
            .fetch_all(query)
            .await?
            .into_iter()
            .map(|mut record| record.remove(column).unwrap_or(DatabaseValue::Null))
            .collect())
    }

    /// Stream the result in chunks of at most `size` rows.
    ///
    /// Every full chunk is handed over as soon as it fills; a trailing partial
    /// chunk follows the end of the stream. An empty result produces a single
    /// empty chunk. Relations requested with `with` are loaded per chunk.
    pub async fn chunk<F, Fut>(&self, size: usize, mut handler: F) -> OrmResult<()>
    where
        F: FnMut(Vec<Loaded<M>>) -> Fut,
        Fut: Future<Output = OrmResult<()>>,
    {
        if size == 0 {
            return Err(ModelError::Query("chunk size must be at least 1".to_string()));
        }

        let mut stream = self.db.stream(self.prepared()).await?;
        let mut buffer = Vec::with_capacity(size);
        let mut delivered = 0usize;
        while let Some(record) = stream.next().await {
            buffer.push(record);
            if buffer.len() == size {
                let full = std::mem::replace(&mut buffer, Vec::with_capacity(size));
                handler(self.hydrate(full).await?).await?;
                delivered += 1;
            }
        }
        stream.finish().await?;

        if !buffer.is_empty() || delivered == 0 {
            handler(self.hydrate(buffer).await?).await?;
            delivered += 1;
        }
        debug!(entity = self.entity(), chunks = delivered, size, "Chunked query complete");
        Ok(())
    }

    async fn hydrate(&self, records: Vec<Record>) -> OrmResult<Vec<Loaded<M>>> {
        let cache = if self.eager.is_empty() || records.is_empty() {
            EagerLoadCache::new()
        } else {
            EagerLoader::new(&self.db, self.entity(), self.relations)
                .load(&self.eager, &records)
                .await?
        };

        records
            .iter()
            .map(|record| {
                let model = M::from_row(record)?;
                let mut relations = cache.relations_for(record);
                for name in &self.eager {
                    relations.entry(name.clone()).or_default();
                }
                Ok(Loaded::new(model, self.entity(), relations))
            })
            .collect()
    }
}
