use futures::stream;
use nonzero_ext::nonzero;
use tokio_stream::StreamExt;
use zeropoint::{Controller, RateLimit, RateLimitedStreamExt, TokioClock};

#[derive(Debug, Clone)]
struct Task {
    name: String,
    size: usize,
}

impl Task {
    fn new(name: &str, size: usize) -> Self {
        Self {
            name: name.to_string(),
            size,
        }
    }
}

#[tokio::main]
async fn main() {
    let tasks = vec![
        Task::new("small_task", 1),
        Task::new("medium_task", 5),
        Task::new("large_task", 10),
        Task::new("tiny_task", 1),
        Task::new("huge_task", 20),
        Task::new("oversized_task", 40),
    ];

    // 5 tokens per second with a burst of 25
    let limit = RateLimit::per_second_and_burst(nonzero!(5u32), nonzero!(25u32));
    let controller = Controller::with_clock(limit, TokioClock::default());

    // each task costs as many tokens as its size
    let weighted = stream::iter(tasks).rate_limit_weighted(controller, |task: &Task| task.size as f64);
    let mut weighted = std::pin::pin!(weighted);

    println!("Processing tasks at 5 tokens/second, burst 25");
    let start = std::time::Instant::now();
    while let Some(task) = weighted.next().await {
        let elapsed = start.elapsed().as_secs_f64();
        match task {
            Ok(task) => println!(
                "[{elapsed:>6.2}s] processed '{}' ({} tokens)",
                task.name, task.size
            ),
            Err(err) => println!("[{elapsed:>6.2}s] rejected: {err}"),
        }
    }
    println!("Total time: {:.2}s", start.elapsed().as_secs_f64());
}
