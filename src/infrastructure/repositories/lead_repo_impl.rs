// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::models::lead::{Lead, LeadCandidate, LeadQuery, LeadSourceCount, UpsertOutcome};
use crate::domain::repositories::crawl_job_repository::RepositoryError;
use crate::domain::repositories::lead_repository::LeadRepository;
use crate::infrastructure::database::entities::lead as lead_entity;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{
    sea_query::{Expr, Func, OnConflict},
    ActiveValue::NotSet,
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, FromQueryResult, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::sync::Arc;
use uuid::Uuid;

const DEFAULT_PAGE_SIZE: u64 = 50;
const MAX_PAGE_SIZE: u64 = 500;

/// 线索仓库实现
#[derive(Clone)]
pub struct LeadRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl LeadRepositoryImpl {
    /// 创建新的线索仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl From<lead_entity::Model> for Lead {
    fn from(model: lead_entity::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            role: model.role,
            company: model.company,
            email: model.email,
            snippet: model.snippet,
            tags: serde_json::from_value(model.tags).unwrap_or_default(),
            profile_url: model.profile_url,
            source_domain: model.source_domain,
            raw_data: model.raw_data,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

/// 把查询参数翻译成 SQL 条件，标签条件除外
fn lead_condition(query: &LeadQuery) -> Condition {
    let mut condition = Condition::all();

    if let Some(domain) = &query.source_domain {
        condition = condition.add(lead_entity::Column::SourceDomain.eq(domain.as_str()));
    }
    if let Some(text) = query.q.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let pattern = format!("%{}%", text.to_lowercase());
        let mut any = Condition::any();
        for column in [
            lead_entity::Column::Name,
            lead_entity::Column::Role,
            lead_entity::Column::Company,
            lead_entity::Column::Email,
        ] {
            any = any.add(Expr::expr(Func::lower(Expr::col(column))).like(pattern.as_str()));
        }
        condition = condition.add(any);
    }
    match query.has_email {
        Some(true) => condition = condition.add(lead_entity::Column::Email.ne("")),
        Some(false) => condition = condition.add(lead_entity::Column::Email.eq("")),
        None => {}
    }
    if let Some(after) = query.created_after {
        let after: DateTime<FixedOffset> = after.into();
        condition = condition.add(lead_entity::Column::CreatedAt.gte(after));
    }
    if let Some(before) = query.created_before {
        let before: DateTime<FixedOffset> = before.into();
        condition = condition.add(lead_entity::Column::CreatedAt.lte(before));
    }

    condition
}

#[derive(Debug, FromQueryResult)]
struct SourceCountRow {
    source_domain: String,
    count: i64,
}

#[async_trait]
impl LeadRepository for LeadRepositoryImpl {
    async fn upsert(&self, candidate: &LeadCandidate) -> Result<UpsertOutcome, RepositoryError> {
        let now: DateTime<FixedOffset> = Utc::now().into();
        let tags = serde_json::json!(candidate.tags);
        let txn = self.db.begin().await?;

        let insert = lead_entity::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(candidate.name.clone()),
            role: Set(candidate.role.clone()),
            company: Set(candidate.company.clone()),
            email: Set(candidate.email.clone()),
            snippet: Set(candidate.snippet.clone()),
            tags: Set(tags.clone()),
            profile_url: Set(candidate.profile_url.clone()),
            source_domain: Set(candidate.source_domain.clone()),
            raw_data: Set(candidate.raw_data.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        // Conditional insert: a concurrent writer that already holds the
        // natural key turns this into a no-op instead of an error.
        let inserted = lead_entity::Entity::insert(insert)
            .on_conflict(
                OnConflict::columns([
                    lead_entity::Column::ProfileUrl,
                    lead_entity::Column::SourceDomain,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&txn)
            .await?;

        let created = inserted == 1;
        if !created {
            let update = lead_entity::ActiveModel {
                id: NotSet,
                name: Set(candidate.name.clone()),
                role: Set(candidate.role.clone()),
                company: Set(candidate.company.clone()),
                email: Set(candidate.email.clone()),
                snippet: Set(candidate.snippet.clone()),
                tags: Set(tags),
                profile_url: NotSet,
                source_domain: NotSet,
                raw_data: Set(candidate.raw_data.clone()),
                created_at: NotSet,
                updated_at: Set(now),
            };

            lead_entity::Entity::update_many()
                .set(update)
                .filter(lead_entity::Column::ProfileUrl.eq(candidate.profile_url.as_str()))
                .filter(lead_entity::Column::SourceDomain.eq(candidate.source_domain.as_str()))
                .exec(&txn)
                .await?;
        }

        let lead_id = lead_entity::Entity::find()
            .select_only()
            .column(lead_entity::Column::Id)
            .filter(lead_entity::Column::ProfileUrl.eq(candidate.profile_url.as_str()))
            .filter(lead_entity::Column::SourceDomain.eq(candidate.source_domain.as_str()))
            .into_tuple::<Uuid>()
            .one(&txn)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        txn.commit().await?;

        Ok(UpsertOutcome { lead_id, created })
    }

    async fn find_by_natural_key(
        &self,
        profile_url: &str,
        source_domain: &str,
    ) -> Result<Option<Lead>, RepositoryError> {
        let model = lead_entity::Entity::find()
            .filter(lead_entity::Column::ProfileUrl.eq(profile_url))
            .filter(lead_entity::Column::SourceDomain.eq(source_domain))
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Lead>, RepositoryError> {
        let model = lead_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }

    async fn query(&self, query: &LeadQuery) -> Result<Vec<Lead>, RepositoryError> {
        let limit = query
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let offset = query.offset.unwrap_or(0);

        let select = lead_entity::Entity::find()
            .filter(lead_condition(query))
            .order_by_desc(lead_entity::Column::UpdatedAt)
            .order_by_asc(lead_entity::Column::Id);

        // Tags live in a JSON column whose operators differ between backends,
        // so the tag filter is applied while paging through the result set.
        let Some(tag) = &query.tag else {
            let models = select
                .offset(offset)
                .limit(limit)
                .all(self.db.as_ref())
                .await?;
            return Ok(models.into_iter().map(Into::into).collect());
        };

        let mut paginator = select.paginate(self.db.as_ref(), MAX_PAGE_SIZE);
        let mut skipped = 0;
        let mut leads = Vec::new();
        while let Some(models) = paginator.fetch_and_next().await? {
            for lead in models.into_iter().map(Lead::from) {
                if !lead.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
                    continue;
                }
                if skipped < offset {
                    skipped += 1;
                    continue;
                }
                leads.push(lead);
                if leads.len() as u64 >= limit {
                    return Ok(leads);
                }
            }
        }
        Ok(leads)
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let count = lead_entity::Entity::find().count(self.db.as_ref()).await?;
        Ok(count)
    }

    async fn count_with_email(&self) -> Result<u64, RepositoryError> {
        let count = lead_entity::Entity::find()
            .filter(lead_entity::Column::Email.ne(""))
            .count(self.db.as_ref())
            .await?;
        Ok(count)
    }

    async fn count_by_source(&self) -> Result<Vec<LeadSourceCount>, RepositoryError> {
        let rows = lead_entity::Entity::find()
            .select_only()
            .column(lead_entity::Column::SourceDomain)
            .column_as(lead_entity::Column::Id.count(), "count")
            .group_by(lead_entity::Column::SourceDomain)
            .order_by_asc(lead_entity::Column::SourceDomain)
            .into_model::<SourceCountRow>()
            .all(self.db.as_ref())
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| LeadSourceCount {
                source_domain: row.source_domain,
                count: row.count,
            })
            .collect())
    }
}
