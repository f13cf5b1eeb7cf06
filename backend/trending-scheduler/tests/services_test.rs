//! Read paths and engagement side-effects.

mod common;

#[cfg(test)]
mod tests {
    use super::common::{ts, FakeSource, MemoryCache, MemoryRankingStore};
    use async_trait::async_trait;
    use inkspace_cache::{CacheKey, CacheOperations, ContentKind, RankWindow};
    use mockall::predicate::*;
    use mockall::*;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use trending_scheduler::config::CacheTtlConfig;
    use trending_scheduler::db::{ContentRepository, CounterColumn};
    use trending_scheduler::scoring::Counters;
    use trending_scheduler::services::{
        notification_queue, ContentCache, Engagement, EngagementService, NotificationKind,
        PageSource, TrendingReader,
    };
    use trending_scheduler::{Result, ServiceError};

    mock! {
        pub Repo {}

        #[async_trait]
        impl ContentRepository for Repo {
            async fn adjust_counter(
                &self,
                kind: ContentKind,
                id: i64,
                column: CounterColumn,
                delta: i64,
            ) -> Result<Option<i64>>;
        }
    }

    fn seeded_source(kind: ContentKind, ids: std::ops::RangeInclusive<i64>) -> Arc<FakeSource> {
        let source = Arc::new(FakeSource::default());
        for id in ids {
            // Later ids are newer.
            source.add(kind, id, Counters::default(), ts(2024, 1, id as u32));
        }
        source
    }

    // ============================================
    // TrendingReader
    // ============================================

    #[tokio::test]
    async fn test_trending_page_follows_rank_order() {
        let source = seeded_source(ContentKind::Work, 1..=5);
        let store = Arc::new(MemoryRankingStore::default());
        store.seed(
            "hot:works:zset",
            &[(3, 9.0), (1, 8.0), (5, 7.0), (2, 6.0), (4, 5.0)],
            None,
        );
        let reader = TrendingReader::new(source, store);

        let page = reader
            .page(ContentKind::Work, RankWindow::Hot, 1, 3)
            .await
            .unwrap();
        assert_eq!(page.source, PageSource::Ranked);
        assert_eq!(page.total, 5);
        let ids: Vec<i64> = page.items.iter().map(|i| i.content.id).collect();
        assert_eq!(ids, vec![3, 1, 5]);
        assert_eq!(page.items[0].score, Some(9.0));

        let second = reader
            .page(ContentKind::Work, RankWindow::Hot, 2, 3)
            .await
            .unwrap();
        let ids: Vec<i64> = second.items.iter().map(|i| i.content.id).collect();
        assert_eq!(ids, vec![2, 4]);
    }

    #[tokio::test]
    async fn test_trending_drops_unpublished_ids() {
        let source = seeded_source(ContentKind::Article, 1..=2);
        let store = Arc::new(MemoryRankingStore::default());
        store.seed("rank:articles:week", &[(1, 3.0), (42, 2.0), (2, 1.0)], None);
        let reader = TrendingReader::new(source, store);

        let page = reader
            .page(ContentKind::Article, RankWindow::Week, 1, 10)
            .await
            .unwrap();
        let ids: Vec<i64> = page.items.iter().map(|i| i.content.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(page.total, 3);
    }

    #[tokio::test]
    async fn test_trending_not_ready_serves_latest() {
        let source = seeded_source(ContentKind::Article, 1..=4);
        let store = Arc::new(MemoryRankingStore::default());
        let reader = TrendingReader::new(source, store);

        let page = reader
            .page(ContentKind::Article, RankWindow::Month, 1, 2)
            .await
            .unwrap();
        assert_eq!(page.source, PageSource::NotReady);
        assert_eq!(page.total, 4);
        let ids: Vec<i64> = page.items.iter().map(|i| i.content.id).collect();
        assert_eq!(ids, vec![4, 3]);
        assert!(page.items.iter().all(|i| i.score.is_none()));
    }

    #[tokio::test]
    async fn test_trending_cache_outage_serves_latest() {
        let source = seeded_source(ContentKind::Work, 1..=2);
        let store = Arc::new(MemoryRankingStore::default());
        store.seed("hot:works:zset", &[(1, 1.0)], None);
        store.set_broken(true);
        let reader = TrendingReader::new(source, store);

        let page = reader
            .page(ContentKind::Work, RankWindow::Hot, 0, 0)
            .await
            .unwrap();
        assert_eq!(page.source, PageSource::NotReady);
        assert_eq!((page.page, page.page_size), (1, 10));
        assert_eq!(page.items.len(), 2);
    }

    #[tokio::test]
    async fn test_trending_store_outage_is_an_error() {
        let source = seeded_source(ContentKind::Work, 1..=2);
        source.broken.store(true, Ordering::SeqCst);
        let reader = TrendingReader::new(source, Arc::new(MemoryRankingStore::default()));

        let result = reader.page(ContentKind::Work, RankWindow::Hot, 1, 10).await;
        assert!(matches!(result, Err(ServiceError::Database(_))));
    }

    // ============================================
    // ContentCache
    // ============================================

    #[tokio::test]
    async fn test_content_cache_fills_on_miss() {
        let source = seeded_source(ContentKind::Article, 1..=1);
        let cache = ContentCache::new(
            MemoryCache::default(),
            source.clone(),
            CacheTtlConfig::default(),
        );

        let first = cache.fetch(ContentKind::Article, 1).await.unwrap().unwrap();
        let second = cache.fetch(ContentKind::Article, 1).await.unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(source.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_content_cache_missing_item_is_not_cached() {
        let source = seeded_source(ContentKind::Article, 1..=1);
        let cache = ContentCache::new(
            MemoryCache::default(),
            source.clone(),
            CacheTtlConfig::default(),
        );

        assert!(cache.fetch(ContentKind::Article, 7).await.unwrap().is_none());
        assert!(cache.fetch(ContentKind::Article, 7).await.unwrap().is_none());
        assert_eq!(source.lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_content_cache_outage_reads_through() {
        let source = seeded_source(ContentKind::Work, 1..=1);
        let backing = MemoryCache::default();
        backing.broken.store(true, Ordering::SeqCst);
        let cache = ContentCache::new(backing, source.clone(), CacheTtlConfig::default());

        let work = cache.fetch(ContentKind::Work, 1).await.unwrap();
        assert_eq!(work.map(|w| w.id), Some(1));

        // Invalidation during an outage is silent.
        cache.invalidate(ContentKind::Work, 1).await;
    }

    #[tokio::test]
    async fn test_content_cache_invalidate() {
        let source = seeded_source(ContentKind::Article, 1..=2);
        let cache = ContentCache::new(
            MemoryCache::default(),
            source.clone(),
            CacheTtlConfig::default(),
        );
        cache.fetch(ContentKind::Article, 1).await.unwrap();
        cache.fetch(ContentKind::Article, 2).await.unwrap();

        cache.invalidate(ContentKind::Article, 1).await;
        cache.fetch(ContentKind::Article, 1).await.unwrap();
        cache.fetch(ContentKind::Article, 2).await.unwrap();

        // 1 was reloaded, 2 stayed cached.
        assert_eq!(source.lookups.load(Ordering::SeqCst), 3);
    }

    // ============================================
    // EngagementService
    // ============================================

    #[tokio::test]
    async fn test_like_by_other_user_notifies_author() {
        let mut repo = MockRepo::new();
        repo.expect_adjust_counter()
            .with(
                eq(ContentKind::Article),
                eq(10),
                eq(CounterColumn::Likes),
                eq(1),
            )
            .times(1)
            .returning(|_, _, _, _| Ok(Some(500)));

        let cache = MemoryCache::default();
        cache.put_raw("article:10", "{}");
        cache.put_raw("article:list:page:1", "[]");
        cache.put_raw("article:11", "{}");

        let (notifier, mut rx) = notification_queue(8);
        let service = EngagementService::new(Arc::new(repo), cache, notifier);

        service
            .record(ContentKind::Article, 10, 77, Engagement::Like)
            .await
            .unwrap();

        let sent = rx.try_recv().unwrap();
        assert_eq!(sent.user_id, 500);
        assert_eq!(sent.from_user_id, 77);
        assert_eq!(sent.kind, NotificationKind::Like);
        assert_eq!(sent.article_id, Some(10));
        assert_eq!(sent.work_id, None);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_engagement_invalidates_entity_and_lists() {
        let mut repo = MockRepo::new();
        repo.expect_adjust_counter()
            .returning(|_, _, _, _| Ok(Some(500)));

        let cache = Arc::new(MemoryCache::default());
        cache.put_raw("article:10", "{}");
        cache.put_raw("article:list:page:1", "[]");
        cache.put_raw("article:11", "{}");

        let (notifier, _rx) = notification_queue(8);
        let service = EngagementService::new(Arc::new(repo), SharedCache(cache.clone()), notifier);

        service
            .record(ContentKind::Article, 10, 77, Engagement::View)
            .await
            .unwrap();

        assert_eq!(cache.keys(), vec!["article:11".to_string()]);
    }

    #[tokio::test]
    async fn test_author_acting_on_own_content_is_silent() {
        let mut repo = MockRepo::new();
        repo.expect_adjust_counter()
            .returning(|_, _, _, _| Ok(Some(77)));

        let (notifier, mut rx) = notification_queue(8);
        let service = EngagementService::new(Arc::new(repo), MemoryCache::default(), notifier);

        service
            .record(
                ContentKind::Work,
                3,
                77,
                Engagement::Comment { comment_id: 9 },
            )
            .await
            .unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_comment_notification_carries_ids() {
        let mut repo = MockRepo::new();
        repo.expect_adjust_counter()
            .with(
                eq(ContentKind::Work),
                eq(3),
                eq(CounterColumn::Comments),
                eq(1),
            )
            .returning(|_, _, _, _| Ok(Some(12)));

        let (notifier, mut rx) = notification_queue(8);
        let service = EngagementService::new(Arc::new(repo), MemoryCache::default(), notifier);

        service
            .record(
                ContentKind::Work,
                3,
                77,
                Engagement::Comment { comment_id: 9 },
            )
            .await
            .unwrap();

        let sent = rx.try_recv().unwrap();
        assert_eq!(sent.kind, NotificationKind::Comment);
        assert_eq!(sent.work_id, Some(3));
        assert_eq!(sent.comment_id, Some(9));
    }

    #[tokio::test]
    async fn test_unlike_decrements_without_notification() {
        let mut repo = MockRepo::new();
        repo.expect_adjust_counter()
            .with(always(), always(), eq(CounterColumn::Likes), eq(-1))
            .returning(|_, _, _, _| Ok(Some(500)));

        let (notifier, mut rx) = notification_queue(8);
        let service = EngagementService::new(Arc::new(repo), MemoryCache::default(), notifier);

        service
            .record(ContentKind::Article, 10, 77, Engagement::Unlike)
            .await
            .unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_missing_content_is_not_found() {
        let mut repo = MockRepo::new();
        repo.expect_adjust_counter().returning(|_, _, _, _| Ok(None));

        let (notifier, mut rx) = notification_queue(8);
        let service = EngagementService::new(Arc::new(repo), MemoryCache::default(), notifier);

        let result = service
            .record(ContentKind::Article, 404, 77, Engagement::Like)
            .await;
        assert!(matches!(
            result,
            Err(ServiceError::NotFound { id: 404, .. })
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_full_notification_queue_does_not_fail_action() {
        let mut repo = MockRepo::new();
        repo.expect_adjust_counter()
            .times(2)
            .returning(|_, _, _, _| Ok(Some(500)));

        let (notifier, _rx) = notification_queue(1);
        let service = EngagementService::new(Arc::new(repo), MemoryCache::default(), notifier);

        for _ in 0..2 {
            service
                .record(ContentKind::Article, 10, 77, Engagement::Favorite)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_cache_outage_does_not_fail_action() {
        let mut repo = MockRepo::new();
        repo.expect_adjust_counter()
            .returning(|_, _, _, _| Ok(Some(500)));

        let cache = MemoryCache::default();
        cache.broken.store(true, Ordering::SeqCst);
        let (notifier, mut rx) = notification_queue(8);
        let service = EngagementService::new(Arc::new(repo), cache, notifier);

        service
            .record(ContentKind::Article, 10, 77, Engagement::Like)
            .await
            .unwrap();
        assert!(rx.try_recv().is_ok());
    }

    /// Lets a test keep a handle on the cache it gave away.
    struct SharedCache(Arc<MemoryCache>);

    #[async_trait]
    impl CacheOperations for SharedCache {
        async fn get<T: serde::de::DeserializeOwned + Send>(
            &self,
            key: &str,
        ) -> inkspace_cache::CacheResult<Option<T>> {
            self.0.get(key).await
        }

        async fn set<T: serde::Serialize + Send + Sync>(
            &self,
            key: &str,
            value: &T,
            ttl_secs: u64,
        ) -> inkspace_cache::CacheResult<()> {
            self.0.set(key, value, ttl_secs).await
        }

        async fn del(&self, key: &str) -> inkspace_cache::CacheResult<()> {
            self.0.del(key).await
        }

        async fn scan_del(&self, pattern: &str) -> inkspace_cache::CacheResult<usize> {
            self.0.scan_del(pattern).await
        }
    }

    #[test]
    fn test_entity_key_matches_cache_schema() {
        assert_eq!(CacheKey::content(ContentKind::Article, 10), "article:10");
    }
}
