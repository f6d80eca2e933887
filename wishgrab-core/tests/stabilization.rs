use std::time::Duration;

use async_trait::async_trait;
use wishgrab_core::browser::BrowserResult;
use wishgrab_core::config::StabilizeSection;
use wishgrab_core::wishlist::{RevealSurface, Stabilizer};

/// Surface whose height follows a script. Once the script runs out the
/// last height repeats forever, like a page that stopped growing.
struct ScriptedSurface {
    heights: Vec<u64>,
    cursor: usize,
    scrolls: u32,
    reveals: u32,
    reveal_visible: bool,
    settles: Vec<Duration>,
}

impl ScriptedSurface {
    fn new(heights: Vec<u64>) -> Self {
        Self {
            heights,
            cursor: 0,
            scrolls: 0,
            reveals: 0,
            reveal_visible: false,
            settles: Vec::new(),
        }
    }

    fn with_reveal_control(mut self) -> Self {
        self.reveal_visible = true;
        self
    }
}

#[async_trait]
impl RevealSurface for ScriptedSurface {
    async fn scroll_to_bottom(&mut self) -> BrowserResult<()> {
        self.scrolls += 1;
        Ok(())
    }

    async fn content_height(&mut self) -> BrowserResult<u64> {
        let index = self.cursor.min(self.heights.len() - 1);
        self.cursor += 1;
        Ok(self.heights[index])
    }

    async fn reveal_control_visible(&mut self) -> BrowserResult<bool> {
        Ok(self.reveal_visible)
    }

    async fn activate_reveal_control(&mut self) -> BrowserResult<()> {
        self.reveals += 1;
        Ok(())
    }

    async fn settle(&mut self, interval: Duration) -> BrowserResult<()> {
        self.settles.push(interval);
        Ok(())
    }
}

fn stabilizer() -> Stabilizer {
    Stabilizer::new(StabilizeSection {
        settle_ms: 0,
        reveal_settle_ms: 0,
        patience: 3,
        marker_timeout_ms: 0,
    })
}

#[tokio::test]
async fn terminates_patience_iterations_after_growth_stops() {
    // Height grows for 4 iterations, then holds.
    let mut surface = ScriptedSurface::new(vec![100, 200, 300, 400, 400, 400, 400, 400]);
    let outcome = stabilizer()
        .run(&mut surface, false)
        .await
        .expect("stabilization succeeds");
    assert_eq!(outcome.iterations, 7);
    assert_eq!(outcome.final_height, 400);
    assert_eq!(surface.scrolls, 7);
}

#[tokio::test]
async fn flat_page_terminates_after_baseline_plus_patience() {
    let mut surface = ScriptedSurface::new(vec![500]);
    let outcome = stabilizer()
        .run(&mut surface, false)
        .await
        .expect("stabilization succeeds");
    assert_eq!(outcome.iterations, 4);
}

#[tokio::test]
async fn height_flicker_resets_the_no_growth_counter() {
    // Two flat reads, then a late growth spurt resets the counter.
    let mut surface = ScriptedSurface::new(vec![100, 100, 100, 200, 200, 200, 200]);
    let outcome = stabilizer()
        .run(&mut surface, false)
        .await
        .expect("stabilization succeeds");
    assert_eq!(outcome.iterations, 7);
    assert_eq!(outcome.final_height, 200);
}

#[tokio::test]
async fn single_pass_runs_exactly_one_iteration() {
    let mut surface = ScriptedSurface::new(vec![100, 200, 300]);
    let outcome = stabilizer()
        .run(&mut surface, true)
        .await
        .expect("stabilization succeeds");
    assert_eq!(outcome.iterations, 1);
    assert_eq!(surface.scrolls, 1);
}

#[tokio::test]
async fn visible_reveal_control_is_activated_every_iteration() {
    let mut surface = ScriptedSurface::new(vec![700]).with_reveal_control();
    let outcome = stabilizer()
        .run(&mut surface, false)
        .await
        .expect("stabilization succeeds");
    assert_eq!(surface.reveals, outcome.iterations);
    // Each iteration settles twice: once after the scroll, once after
    // the reveal activation.
    assert_eq!(surface.settles.len() as u32, outcome.iterations * 2);
}

#[tokio::test]
async fn hidden_reveal_control_is_never_activated() {
    let mut surface = ScriptedSurface::new(vec![700]);
    stabilizer()
        .run(&mut surface, false)
        .await
        .expect("stabilization succeeds");
    assert_eq!(surface.reveals, 0);
}
