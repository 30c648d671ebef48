// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Typed CRUD facade.
//!
//! [`Repository`] binds the cached templates of [`SqlGenerator`] to an
//! [`Executor`]. Obtained from a [`Database`](crate::executor::Database) it
//! runs each call on its own connection; obtained from a
//! [`Transaction`](crate::transaction::Transaction) every call joins that
//! transaction.
//!
//! ```rust,ignore
//! let articles = db.repository::<Article>();
//! let mut article = Article { title: "Hello".into(), ..Default::default() };
//! articles.create(&mut article).await?;
//! assert!(article.id > 0);
//!
//! let drafts = articles.count(Some(!col("Published"))).await?;
//! ```
//!
//! [`SqlGenerator`]: crate::generator::SqlGenerator

use std::marker::PhantomData;

use tracing::debug;

use crate::{
    entity::Entity,
    error::{Error, Result},
    executor::Executor,
    expr::{Expr, col},
    generator::{Aggregate, Patch, key_predicate},
    query::Query,
    value::{FromValue, Value}
};

/// Direction of an ordinal move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveDirection {
    /// Towards smaller ordinals.
    Up,
    /// Towards larger ordinals.
    Down
}

impl MoveDirection {
    /// Check if moving up.
    pub const fn is_up(&self) -> bool {
        matches!(self, Self::Up)
    }

    /// Check if moving down.
    pub const fn is_down(&self) -> bool {
        matches!(self, Self::Down)
    }
}

/// CRUD operations over `T`.
pub struct Repository<'e, T: Entity> {
    executor: &'e dyn Executor,
    marker:   PhantomData<fn() -> T>
}

impl<'e, T: Entity> Repository<'e, T> {
    /// Bind a repository to an executor.
    pub fn new(executor: &'e dyn Executor) -> Self {
        Self {
            executor,
            marker: PhantomData
        }
    }

    /// Start a query over `T` on the same executor.
    pub fn query(&self) -> Query<'e, T> {
        Query::new(self.executor)
    }

    /// Insert `entity`.
    ///
    /// With an identity column the generated value is written back into
    /// `entity`. Returns `false` when nothing was inserted.
    pub async fn create(&self, entity: &mut T) -> Result<bool> {
        let ty = T::entity_type();
        let stmt = self.executor.generator().create(ty)?;
        let parameters = stmt.resolve(|name| entity.get(name));

        let Some(identity) = ty.identity() else {
            let rows = self
                .executor
                .execute(stmt.text(), parameters.into())
                .await?;
            return Ok(rows > 0);
        };

        // The identity select is the last statement; a driver may also
        // report an empty set for the INSERT in front of it.
        let generated = self
            .executor
            .reader(stmt.text(), parameters.into())
            .await?
            .into_sets()
            .pop()
            .map(|set| set.first_value())
            .unwrap_or_default();
        if generated.is_null() {
            return Ok(false);
        }
        let generated = generated.convert(identity.kind())?;
        debug!(entity = ty.name(), identity = %generated.describe(), "identity assigned");
        entity.set(identity.name(), generated)?;
        Ok(true)
    }

    /// Write every updatable column of `entity`, keyed by its primary key.
    pub async fn update(&self, entity: &T) -> Result<bool> {
        let stmt = self
            .executor
            .generator()
            .update(T::entity_type())?;
        let rows = self
            .executor
            .execute(stmt.text(), stmt.resolve(|name| entity.get(name)).into())
            .await?;
        Ok(rows > 0)
    }

    /// Apply `patch` to every row matching `filter` (every row without
    /// one). Returns the affected row count.
    pub async fn update_where(&self, filter: Option<Expr>, patch: &Patch) -> Result<u64> {
        let stmt = self
            .executor
            .generator()
            .update_where(T::entity_type(), filter.as_ref(), patch)?;
        self.executor
            .execute(stmt.text(), stmt.bound().into())
            .await
    }

    /// Delete `entity` by its primary key.
    pub async fn delete(&self, entity: &T) -> Result<bool> {
        let stmt = self
            .executor
            .generator()
            .delete(T::entity_type())?;
        let rows = self
            .executor
            .execute(stmt.text(), stmt.resolve(|name| entity.get(name)).into())
            .await?;
        Ok(rows > 0)
    }

    /// Delete the row with the given primary key values.
    pub async fn delete_by_key(&self, keys: &[Value]) -> Result<bool> {
        let predicate = key_predicate(T::entity_type(), keys)?;
        Ok(self.delete_where(Some(predicate)).await? > 0)
    }

    /// Delete every row matching `filter` (every row without one).
    pub async fn delete_where(&self, filter: Option<Expr>) -> Result<u64> {
        let stmt = self
            .executor
            .generator()
            .delete_where(T::entity_type(), filter.as_ref())?;
        self.executor
            .execute(stmt.text(), stmt.bound().into())
            .await
    }

    /// Row with a single-column primary key.
    pub async fn find(&self, key: impl Into<Value>) -> Result<Option<T>>
    where
        T: Default
    {
        self.find_by_key(&[key.into()]).await
    }

    /// Row with the given primary key values, in key declaration order.
    pub async fn find_by_key(&self, keys: &[Value]) -> Result<Option<T>>
    where
        T: Default
    {
        let ty = T::entity_type();
        let stmt = self.executor.generator().find(ty)?;
        if stmt.parameters().len() != keys.len() {
            return Err(Error::argument(
                "keys",
                format!(
                    "`{}` has {} key column(s), got {} value(s)",
                    ty.name(),
                    stmt.parameters().len(),
                    keys.len()
                )
            ));
        }
        let mut supplied = keys.iter();
        let parameters = stmt.resolve(|_| supplied.next().cloned().unwrap_or_default());
        let reader = self
            .executor
            .reader(stmt.text(), parameters.into())
            .await?;
        reader.read_first()
    }

    /// First row matching `filter`.
    pub async fn first(&self, filter: Expr) -> Result<Option<T>>
    where
        T: Default
    {
        self.query().filter(filter).first().await
    }

    /// Every row matching `filter` (every row without one).
    pub async fn fetch(&self, filter: Option<Expr>) -> Result<Vec<T>>
    where
        T: Default
    {
        let stmt = self
            .executor
            .generator()
            .fetch(T::entity_type(), filter.as_ref())?;
        let reader = self
            .executor
            .reader(stmt.text(), stmt.bound().into())
            .await?;
        reader.read()
    }

    /// Check if any row matches `filter`.
    pub async fn any(&self, filter: Option<Expr>) -> Result<bool> {
        let stmt = self
            .executor
            .generator()
            .any(T::entity_type(), filter.as_ref())?;
        let reader = self
            .executor
            .reader(stmt.text(), stmt.bound().into())
            .await?;
        Ok(!reader.rows().is_empty())
    }

    /// Number of rows matching `filter`.
    pub async fn count(&self, filter: Option<Expr>) -> Result<u64> {
        self.aggregate(Aggregate::Count, None, filter).await
    }

    /// `MAX(column)`; NULL converts through [`FromValue::from_null`].
    pub async fn max<V: FromValue>(&self, column: Expr, filter: Option<Expr>) -> Result<V> {
        self.aggregate(Aggregate::Max, Some(column), filter)
            .await
    }

    /// `MIN(column)`.
    pub async fn min<V: FromValue>(&self, column: Expr, filter: Option<Expr>) -> Result<V> {
        self.aggregate(Aggregate::Min, Some(column), filter)
            .await
    }

    /// `SUM(column)`.
    pub async fn sum<V: FromValue>(&self, column: Expr, filter: Option<Expr>) -> Result<V> {
        self.aggregate(Aggregate::Sum, Some(column), filter)
            .await
    }

    /// Any aggregate over `column` (`COUNT(1)` for a count without one).
    pub async fn aggregate<V: FromValue>(
        &self,
        aggregate: Aggregate,
        column: Option<Expr>,
        filter: Option<Expr>
    ) -> Result<V> {
        let stmt = self.executor.generator().scalar(
            T::entity_type(),
            aggregate,
            column.as_ref(),
            filter.as_ref()
        )?;
        let value = self
            .executor
            .scalar(stmt.text(), stmt.bound().into())
            .await?;
        V::from_nullable(value)
    }

    /// Swap the `order` property of `entity` with the nearest smaller one.
    pub async fn move_up(&self, entity: &T, order: &str, scope: Option<Expr>) -> Result<bool>
    where
        T: Default
    {
        self.move_to(entity, order, MoveDirection::Up, scope)
            .await
    }

    /// Swap the `order` property of `entity` with the nearest larger one.
    pub async fn move_down(&self, entity: &T, order: &str, scope: Option<Expr>) -> Result<bool>
    where
        T: Default
    {
        self.move_to(entity, order, MoveDirection::Down, scope)
            .await
    }

    /// Swap ordinals with the adjacent row inside `scope`.
    ///
    /// Returns `false` when `entity` is already first (up) or last (down).
    /// The two updates run on this repository's executor; use a
    /// transaction-scoped repository to make the swap atomic.
    pub async fn move_to(
        &self,
        entity: &T,
        order: &str,
        direction: MoveDirection,
        scope: Option<Expr>
    ) -> Result<bool>
    where
        T: Default
    {
        let ty = T::entity_type();
        let property = ty.property(order)?;
        if property.is_key() {
            return Err(Error::argument(
                "order",
                format!("key column `{order}` cannot be used as an ordinal")
            ));
        }
        let current = entity.get(order);
        if current.is_null() {
            return Err(Error::argument("order", format!("`{order}` is NULL")));
        }

        let column = col(order);
        let neighbour = match direction {
            MoveDirection::Up => column.clone().lt(current.clone()),
            MoveDirection::Down => column.clone().gt(current.clone())
        };
        let filter = match scope {
            Some(scope) => scope.and(neighbour),
            None => neighbour
        };
        let query = self.query().filter(filter);
        let query = match direction {
            MoveDirection::Up => query.order_by_desc(column),
            MoveDirection::Down => query.order_by(column)
        };
        let Some(other) = query.first().await? else {
            return Ok(false);
        };

        let swapped = other.get(order);
        self.update_where(
            Some(key_predicate(ty, &key_values(entity))?),
            &Patch::new().set(order, swapped)
        )
        .await?;
        self.update_where(
            Some(key_predicate(ty, &key_values(&other))?),
            &Patch::new().set(order, current)
        )
        .await?;
        debug!(entity = ty.name(), order, ?direction, "ordinal swapped");
        Ok(true)
    }
}

fn key_values<T: Entity>(entity: &T) -> Vec<Value> {
    T::entity_type()
        .primary_key()
        .map(|p| entity.get(p.name()))
        .collect()
}
