// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod api_test;
pub mod crawl_job_repository_test;
pub mod helpers;
pub mod lead_repository_test;
pub mod pipeline_test;
pub mod redis_rate_limit_test;
