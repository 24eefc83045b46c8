//! Terminal walkthrough of a lesson on a simulated media element.

use std::collections::BTreeMap;
use std::error::Error;
use std::io::BufRead;
use std::sync::Arc;

use lab_core::Clock;
use lab_core::model::{InteractionDefinition, InteractionKind, LessonDefinition, Response};
use services::{
    LessonError, LessonEvent, LessonProgress, LessonSession, MediaElementAdapter, Mutation,
    PlaybackAdapter, ResolverError, event_channel,
};
use storage::repository::ProgressRepository;

pub struct PlayOptions {
    /// Answer every interaction correctly instead of reading stdin.
    pub auto: bool,
    /// Simulated seconds per frame.
    pub step: f64,
}

/// Play `lesson` to the end, stopping at each checkpoint for an answer.
///
/// # Errors
///
/// Returns an error if the session cannot be opened, the player fails, or
/// stdin closes while an answer is expected.
pub async fn play_lesson(
    lesson: &LessonDefinition,
    repo: Arc<dyn ProgressRepository>,
    key: &str,
    options: &PlayOptions,
    input: &mut impl BufRead,
) -> Result<LessonProgress, Box<dyn Error>> {
    let (tx, mut rx) = event_channel();
    let player = MediaElementAdapter::load(lesson.lesson.duration_secs, tx)?;
    let mut session = LessonSession::open(lesson, repo, key, Clock::default_clock(), player).await?;
    println!("▶ {} ({})", lesson.lesson.title, lesson.lesson.lesson_id);

    let mut ended = false;
    for event in saved(session.pump(&mut rx).await?) {
        ended |= report(&event);
    }
    session.play()?;

    while !ended {
        session.player_mut().advance(options.step)?;
        for event in saved(session.pump(&mut rx).await?) {
            if let LessonEvent::Activated(_) = event {
                answer(&mut session, options.auto, input).await?;
                let resumed = saved(session.acknowledge().await?);
                report(&resumed);
            } else {
                ended |= report(&event);
            }
        }
        // Stopped with nothing to answer: no further events will come.
        ended |= !session.player().is_playing() && session.active().is_none();
    }

    session.flush().await?;
    Ok(session.progress())
}

/// Tell the learner when progress could not be saved; the lesson goes on.
fn saved<T>(mutation: Mutation<T>) -> T {
    if let Err(err) = &mutation.persisted {
        println!("  ! progress not saved: {err}");
    }
    mutation.value
}

fn report(event: &LessonEvent) -> bool {
    match event {
        LessonEvent::Ready {
            duration,
            resumed_at: Some(at),
        } => println!("  video ready ({duration:.0}s), resuming at {at:.1}s"),
        LessonEvent::Ready { duration, .. } => println!("  video ready ({duration:.0}s)"),
        LessonEvent::Reached(id) => println!("  ✓ passed {id}"),
        LessonEvent::Resumed(id) => println!("  ▶ resumed after {id}"),
        LessonEvent::Activated(id) => println!("  ⏸ paused for {id}"),
        LessonEvent::Ended => {
            println!("■ video ended");
            return true;
        }
    }
    false
}

async fn answer<P: PlaybackAdapter>(
    session: &mut LessonSession<P>,
    auto: bool,
    input: &mut impl BufRead,
) -> Result<(), Box<dyn Error>> {
    let Some(active) = session.active() else {
        return Ok(());
    };
    let definition = active.definition().clone();
    print_prompt(&definition);

    loop {
        let response = if auto {
            answer_key(&definition)
        } else {
            read_response(&definition, input)?
        };
        match session.submit(&response).await {
            Ok(outcome) => {
                let outcome = saved(outcome);
                let verdict = if outcome.correct { "correct" } else { "incorrect" };
                println!("  → {verdict}, +{} points", outcome.score);
                if !outcome.explanation.is_empty() {
                    println!("    {}", outcome.explanation);
                }
                return Ok(());
            }
            Err(LessonError::Resolver(ResolverError::InvalidResponse(err))) if !auto => {
                println!("  invalid answer: {err}");
            }
            Err(err) => return Err(err.into()),
        }
    }
}

fn print_prompt(definition: &InteractionDefinition) {
    println!();
    println!("  {}", definition.question);
    match &definition.kind {
        InteractionKind::Choice { options } => {
            for option in options {
                println!("    [{}] {}", option.id, option.label);
            }
            println!("  answer with an option id:");
        }
        InteractionKind::DragMatch { items, targets } => {
            println!("    items:");
            for item in items {
                println!("      {} ({})", item.id, item.label);
            }
            println!("    targets:");
            for target in targets {
                println!("      {} ({})", target.id, target.label);
            }
            println!("  answer with target=item pairs separated by spaces:");
        }
    }
}

/// The correct response for `definition`.
fn answer_key(definition: &InteractionDefinition) -> Response {
    match &definition.kind {
        InteractionKind::Choice { options } => {
            let chosen = options
                .iter()
                .find(|o| o.is_correct)
                .or_else(|| options.first())
                .map(|o| o.id.clone())
                .unwrap_or_default();
            Response::Choice(chosen)
        }
        InteractionKind::DragMatch { items, .. } => Response::DragMatch(
            items
                .iter()
                .map(|item| (item.target_id.clone(), item.id.clone()))
                .collect(),
        ),
    }
}

fn read_response(
    definition: &InteractionDefinition,
    input: &mut impl BufRead,
) -> Result<Response, Box<dyn Error>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err("stdin closed while waiting for an answer".into());
    }
    Ok(parse_response(definition, &line))
}

fn parse_response(definition: &InteractionDefinition, line: &str) -> Response {
    match definition.kind {
        InteractionKind::Choice { .. } => Response::Choice(line.trim().to_owned()),
        InteractionKind::DragMatch { .. } => Response::DragMatch(parse_pairs(line)),
    }
}

fn parse_pairs(line: &str) -> BTreeMap<String, String> {
    line.split([' ', ','])
        .filter_map(|pair| pair.split_once('='))
        .map(|(target, item)| (target.trim().to_owned(), item.trim().to_owned()))
        .filter(|(target, item)| !target.is_empty() && !item.is_empty())
        .collect()
}
