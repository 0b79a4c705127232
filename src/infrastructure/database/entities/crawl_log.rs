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

use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "crawl_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub job_id: Uuid,
    pub sequence: i32,
    #[sea_orm(column_type = "Text")]
    pub url: String,
    pub outcome: String,
    pub http_status: Option<i32>,
    pub error_kind: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub error: Option<String>,
    pub content_type: Option<String>,
    pub retries: i32,
    pub elapsed_ms: i64,
    pub leads_found: i32,
    pub leads_updated: i32,
    pub created_at: ChronoDateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::crawl_job::Entity",
        from = "Column::JobId",
        to = "super::crawl_job::Column::Id"
    )]
    CrawlJob,
}

impl Related<super::crawl_job::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CrawlJob.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
