use std::rc::Rc;

use anyhow::Context;
use cadence_core::prelude::*;

#[derive(Debug, PartialEq)]
enum CountQuery {
    Get,
}

struct CounterOut {
    label: Rc<String>,
    bump: Setter<i32>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let runtime = Runtime::new(|hooks| {
        let (count, set_count) = hooks.use_state(|| 0i32)?;
        let label = hooks.use_memo(*count, || format!("count = {}", *count))?;

        hooks.use_mount_effect(|| {
            log::info!("counter mounted");
            Some(Dispose::new(|| log::info!("counter unmounted")))
        })?;

        let count_now = *count;
        hooks.use_effect(*count, move || {
            log::info!("count changed to {count_now}");
            None
        })?;

        hooks.use_query(move |q| match q {
            CountQuery::Get => Some(count_now),
        })?;

        Ok(CounterOut {
            label,
            bump: set_count,
        })
    });

    runtime.on_render(|out: &CounterOut| println!("{}", out.label));

    runtime.initialize()?;

    let bump = runtime
        .with_output(|out| out.bump.clone())
        .context("no output emitted")?;
    for _ in 0..3 {
        bump.update(|n| n + 1)?;
    }

    let answer = runtime.query::<CountQuery, i32>(CountQuery::Get)?;
    println!("query answered: {answer:?}");

    runtime.finalize()?;
    Ok(())
}
