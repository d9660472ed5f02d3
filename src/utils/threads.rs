use futures::StreamExt;
use futures::stream;
use std::future::Future;

/// 以有限并发执行一组 future，结果按输入顺序返回
pub async fn do_parallel_with_limit<F, T>(futures: Vec<F>, max_concurrent: usize) -> Vec<T>
where
    F: Future<Output = T>,
{
    stream::iter(futures)
        .buffered(max_concurrent.max(1))
        .collect()
        .await
}
