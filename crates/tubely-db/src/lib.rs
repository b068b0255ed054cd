//! Tubely-DB: metadata store for users and their videos
//!
//! SQLite through rusqlite, pooled with r2d2. The schema is created by
//! embedded migrations when a pool is initialised.
//!
//! # Example
//!
//! ```
//! use tubely_db::pool::{get_conn, init_memory_pool};
//! use tubely_db::queries::{users, videos};
//!
//! let pool = init_memory_pool().unwrap();
//! let conn = get_conn(&pool).unwrap();
//!
//! let user = users::create_user(&conn, "creator@example.com").unwrap();
//! let video = videos::create_video(&conn, user.id, "Boots", "A pair of boots").unwrap();
//! assert!(video.video_url.is_none());
//! ```

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
