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
#[sea_orm(table_name = "crawl_jobs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub site_config_id: Uuid,
    pub status: String,
    pub triggered_by: String,
    pub pages_fetched: i32,
    pub leads_found: i32,
    pub leads_updated: i32,
    pub error_count: i32,
    pub error_message: Option<String>,
    pub started_at: Option<ChronoDateTimeWithTimeZone>,
    pub finished_at: Option<ChronoDateTimeWithTimeZone>,
    pub created_at: ChronoDateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::site_config::Entity",
        from = "Column::SiteConfigId",
        to = "super::site_config::Column::Id"
    )]
    SiteConfig,
    #[sea_orm(has_many = "super::crawl_log::Entity")]
    CrawlLog,
}

impl Related<super::site_config::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SiteConfig.def()
    }
}

impl Related<super::crawl_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CrawlLog.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
