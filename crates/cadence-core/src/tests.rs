#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use crate::effects::Dispose;
    use crate::error::Fault;
    use crate::ext::{use_latest, use_previous};
    use crate::interpret::Reason;
    use crate::runtime::{Event, Runtime};
    use crate::slot::SlotKind;
    use crate::state::Setter;

    fn recorded<O: 'static>(runtime: &Runtime<O>) -> Rc<RefCell<Vec<Event>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        runtime.set_probe(move |event| sink.borrow_mut().push(event.clone()));
        events
    }

    #[test]
    fn repeated_steps_replay_the_same_slots() {
        let runtime = Runtime::new(|hooks| {
            let (a, set_a) = hooks.use_state(|| 1i32)?;
            let side = hooks.use_ref(|| String::from("side"))?;
            let doubled = hooks.use_memo(*a, || *a * 2)?;
            hooks.use_mount_effect(|| None)?;
            hooks.use_effect(*a, || None)?;
            let _ = side;
            Ok((*doubled, set_a))
        });
        runtime.initialize().unwrap();
        for i in 2..6 {
            let set = runtime.with_output(|(_, s)| s.clone()).unwrap();
            set.set(i).unwrap();
            assert_eq!(runtime.with_output(|(d, _)| *d), Some(2 * i));
        }
        runtime.finalize().unwrap();
    }

    #[test]
    fn memo_gating_scenario() {
        #[derive(Clone)]
        struct Out {
            memo1: Rc<i32>,
            memo2: Rc<i32>,
            memo3: Rc<i32>,
            s1: Setter<i32>,
            s2: Setter<i32>,
            s3: Setter<i32>,
        }

        let runtime = Runtime::new(|hooks| {
            let (s1, set1) = hooks.use_state(|| 0i32)?;
            let (s2, set2) = hooks.use_state(|| 0i32)?;
            let (s3, set3) = hooks.use_state(|| 0i32)?;
            let memo1 = hooks.use_memo(*s1, || *s1 + 5)?;
            let memo2 = hooks.use_memo(*s2, || *s2 + 5)?;
            let memo3 = hooks.use_memo((*s1, *s2), || *s1 + *s2 + 5)?;
            let _ = s3;
            Ok(Out {
                memo1,
                memo2,
                memo3,
                s1: set1,
                s2: set2,
                s3: set3,
            })
        });
        let events = recorded(&runtime);

        runtime.initialize().unwrap();
        let out = runtime.with_output(|o| o.clone()).unwrap();
        assert_eq!((*out.memo1, *out.memo2, *out.memo3), (5, 5, 5));
        assert_eq!(
            *events.borrow(),
            vec![
                Event::PassStarted(Reason::Initialize),
                Event::MemoComputed { slot: 3 },
                Event::MemoComputed { slot: 4 },
                Event::MemoComputed { slot: 5 },
                Event::Rendered,
            ]
        );

        events.borrow_mut().clear();
        out.s1.update(|n| n + 1).unwrap();
        let after_s1 = runtime.with_output(|o| o.clone()).unwrap();
        assert_eq!((*after_s1.memo1, *after_s1.memo2, *after_s1.memo3), (6, 5, 6));
        assert_eq!(
            *events.borrow(),
            vec![
                Event::StateCommitted,
                Event::PassStarted(Reason::Step),
                Event::MemoComputed { slot: 3 },
                Event::MemoComputed { slot: 5 },
                Event::Rendered,
            ]
        );

        events.borrow_mut().clear();
        out.s2.update(|n| n + 1).unwrap();
        let after_s2 = runtime.with_output(|o| o.clone()).unwrap();
        assert_eq!((*after_s2.memo1, *after_s2.memo2, *after_s2.memo3), (6, 6, 7));
        assert_eq!(
            *events.borrow(),
            vec![
                Event::StateCommitted,
                Event::PassStarted(Reason::Step),
                Event::MemoComputed { slot: 4 },
                Event::MemoComputed { slot: 5 },
                Event::Rendered,
            ]
        );

        events.borrow_mut().clear();
        out.s3.update(|n| n + 1).unwrap();
        let after_s3 = runtime.with_output(|o| o.clone()).unwrap();
        assert_eq!((*after_s3.memo1, *after_s3.memo2, *after_s3.memo3), (6, 6, 7));
        assert_eq!(
            *events.borrow(),
            vec![
                Event::StateCommitted,
                Event::PassStarted(Reason::Step),
                Event::Rendered,
            ]
        );

        events.borrow_mut().clear();
        runtime.finalize().unwrap();
        assert_eq!(
            *events.borrow(),
            vec![Event::PassStarted(Reason::Finalize), Event::Rendered]
        );
        assert_eq!(out.s1.set(9), Err(Fault::Finalized));
        assert_eq!(runtime.step(), Err(Fault::Finalized));
    }

    #[test]
    fn memo_compute_runs_only_on_changed_capture() {
        let runs = Rc::new(Cell::new(0));
        let runs_in = runs.clone();
        let runtime = Runtime::new(move |hooks| {
            let (a, set_a) = hooks.use_state(|| 0i32)?;
            let (b, set_b) = hooks.use_state(|| 0i32)?;
            let av = *a;
            let runs = runs_in.clone();
            let doubled = hooks.use_memo(av, move || {
                runs.set(runs.get() + 1);
                av * 2
            })?;
            let _ = b;
            Ok((*doubled, set_a, set_b))
        });
        runtime.initialize().unwrap();
        assert_eq!(runs.get(), 1);

        let set_b = runtime.with_output(|(_, _, b)| b.clone()).unwrap();
        set_b.set(1).unwrap();
        assert_eq!(runs.get(), 1);

        let set_a = runtime.with_output(|(_, a, _)| a.clone()).unwrap();
        set_a.set(3).unwrap();
        assert_eq!(runs.get(), 2);
        assert_eq!(runtime.with_output(|(d, _, _)| *d), Some(6));
        runtime.finalize().unwrap();
    }

    #[test]
    fn tick_effect_cleanup_precedes_next_body() {
        let trace = Rc::new(RefCell::new(Vec::<String>::new()));
        let trace_in = trace.clone();
        let runtime = Runtime::new(move |hooks| {
            let (n, set_n) = hooks.use_state(|| 0i32)?;
            let n_now = *n;
            let body_trace = trace_in.clone();
            hooks.use_effect(*n, move || {
                body_trace.borrow_mut().push(format!("body {n_now}"));
                let cleanup_trace = body_trace.clone();
                Some(Dispose::new(move || {
                    cleanup_trace.borrow_mut().push(format!("cleanup {n_now}"));
                }))
            })?;
            Ok(set_n)
        });
        runtime.initialize().unwrap();
        let set = runtime.with_output(|s| s.clone()).unwrap();
        set.set(1).unwrap();
        set.set(2).unwrap();
        runtime.finalize().unwrap();
        assert_eq!(
            *trace.borrow(),
            vec![
                "body 0",
                "cleanup 0",
                "body 1",
                "cleanup 1",
                "body 2",
                "cleanup 2",
            ]
        );
    }

    #[test]
    fn tick_effect_skips_unchanged_capture() {
        let bodies = Rc::new(Cell::new(0));
        let bodies_in = bodies.clone();
        let runtime = Runtime::new(move |hooks| {
            let (watched, set_watched) = hooks.use_state(|| 0i32)?;
            let (noise, set_noise) = hooks.use_state(|| 0i32)?;
            let bodies = bodies_in.clone();
            hooks.use_effect(*watched, move || {
                bodies.set(bodies.get() + 1);
                None
            })?;
            let _ = (watched, noise);
            Ok((set_watched, set_noise))
        });
        runtime.initialize().unwrap();
        assert_eq!(bodies.get(), 1);

        let set_noise = runtime.with_output(|(_, n)| n.clone()).unwrap();
        set_noise.set(5).unwrap();
        set_noise.set(6).unwrap();
        assert_eq!(bodies.get(), 1);

        let set_watched = runtime.with_output(|(w, _)| w.clone()).unwrap();
        set_watched.set(1).unwrap();
        assert_eq!(bodies.get(), 2);
        runtime.finalize().unwrap();
    }

    #[test]
    fn mount_effect_runs_once_and_cleans_up_at_finalize() {
        let trace = Rc::new(RefCell::new(Vec::<&'static str>::new()));
        let trace_in = trace.clone();
        let runtime = Runtime::new(move |hooks| {
            let (n, set_n) = hooks.use_state(|| 0i32)?;
            let body_trace = trace_in.clone();
            hooks.use_mount_effect(move || {
                body_trace.borrow_mut().push("mounted");
                let cleanup_trace = body_trace.clone();
                Some(Dispose::new(move || {
                    cleanup_trace.borrow_mut().push("unmounted");
                }))
            })?;
            let _ = n;
            Ok(set_n)
        });
        runtime.initialize().unwrap();
        let set = runtime.with_output(|s| s.clone()).unwrap();
        set.set(1).unwrap();
        set.set(2).unwrap();
        assert_eq!(*trace.borrow(), vec!["mounted"]);
        runtime.finalize().unwrap();
        assert_eq!(*trace.borrow(), vec!["mounted", "unmounted"]);
    }

    #[test]
    fn effect_scheduled_writes_become_later_cycles() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_in = seen.clone();
        let runtime = Runtime::new(move |hooks| {
            let (n, set_n) = hooks.use_state(|| 0i32)?;
            let n_now = *n;
            let seen = seen_in.clone();
            let chain = set_n.clone();
            hooks.use_effect(*n, move || {
                seen.borrow_mut().push(n_now);
                if n_now == 1 {
                    let _ = chain.set(2);
                }
                None
            })?;
            Ok(set_n)
        });
        let events = recorded(&runtime);
        runtime.initialize().unwrap();
        events.borrow_mut().clear();

        let set = runtime.with_output(|s| s.clone()).unwrap();
        set.set(1).unwrap();
        // the write issued from the effect body ran as its own cycle,
        // strictly after the first cycle rendered
        assert_eq!(*seen.borrow(), vec![0, 1, 2]);
        assert_eq!(
            *events.borrow(),
            vec![
                Event::StateCommitted,
                Event::PassStarted(Reason::Step),
                Event::EffectRan { slot: 1 },
                Event::Rendered,
                Event::StateCommitted,
                Event::PassStarted(Reason::Step),
                Event::EffectRan { slot: 1 },
                Event::Rendered,
            ]
        );
        runtime.finalize().unwrap();
    }

    #[test]
    fn init_effect_writes_drain_before_initialize_returns() {
        let runtime = Runtime::new(|hooks| {
            let (n, set_n) = hooks.use_state(|| 0i32)?;
            let kick = set_n.clone();
            hooks.use_mount_effect(move || {
                let _ = kick.set(1);
                None
            })?;
            Ok((*n, set_n))
        });
        let events = recorded(&runtime);
        runtime.initialize().unwrap();
        assert_eq!(runtime.with_output(|(n, _)| *n), Some(1));
        assert_eq!(
            *events.borrow(),
            vec![
                Event::PassStarted(Reason::Initialize),
                Event::EffectRan { slot: 1 },
                Event::Rendered,
                Event::StateCommitted,
                Event::PassStarted(Reason::Step),
                Event::Rendered,
            ]
        );
        runtime.finalize().unwrap();
    }

    #[test]
    fn ref_writes_do_not_schedule() {
        let runtime = Runtime::new(|hooks| {
            let cell = hooks.use_ref(|| 0i32)?;
            let snapshot = *cell.borrow();
            Ok((snapshot, cell))
        });
        let events = recorded(&runtime);
        runtime.initialize().unwrap();
        events.borrow_mut().clear();

        let cell = runtime.with_output(|(_, c)| c.clone()).unwrap();
        *cell.borrow_mut() = 7;
        assert!(events.borrow().is_empty());
        assert_eq!(runtime.with_output(|(s, _)| *s), Some(0));

        runtime.step().unwrap();
        assert_eq!(runtime.with_output(|(s, _)| *s), Some(7));
        runtime.finalize().unwrap();
    }

    #[test]
    fn dropping_a_call_site_is_fatal() {
        let skip = Rc::new(Cell::new(false));
        let skip_in = skip.clone();
        let runtime = Runtime::new(move |hooks| {
            let (_, set_a) = hooks.use_state(|| 0i32)?;
            if !skip_in.get() {
                hooks.use_ref(|| 0u8)?;
            }
            Ok(set_a)
        });
        runtime.initialize().unwrap();
        let set = runtime.with_output(|s| s.clone()).unwrap();

        skip.set(true);
        let fault = Fault::CursorMismatch {
            visited: 1,
            stored: 2,
        };
        assert_eq!(set.set(1), Err(fault.clone()));
        // halted: every later request reports the same defect
        assert_eq!(runtime.step(), Err(fault.clone()));
        assert_eq!(runtime.finalize(), Err(fault));
    }

    #[test]
    fn swapping_slot_kinds_is_fatal() {
        let flip = Rc::new(Cell::new(false));
        let flip_in = flip.clone();
        let runtime = Runtime::new(move |hooks| {
            if flip_in.get() {
                hooks.use_ref(|| 0i32)?;
                let (_, set) = hooks.use_state(|| 0i32)?;
                Ok(set)
            } else {
                let (_, set) = hooks.use_state(|| 0i32)?;
                hooks.use_ref(|| 0i32)?;
                Ok(set)
            }
        });
        runtime.initialize().unwrap();
        flip.set(true);
        assert_eq!(
            runtime.step(),
            Err(Fault::KindMismatch {
                index: 0,
                expected: SlotKind::Ref,
                found: SlotKind::State,
            })
        );
    }

    #[test]
    fn changing_capture_shape_is_fatal() {
        let wide = Rc::new(Cell::new(false));
        let wide_in = wide.clone();
        let runtime = Runtime::new(move |hooks| {
            let (n, set) = hooks.use_state(|| 0i32)?;
            if wide_in.get() {
                hooks.use_memo((*n, 0i32), || 0i32)?;
            } else {
                hooks.use_memo(*n, || 0i32)?;
            }
            Ok(set)
        });
        runtime.initialize().unwrap();
        wide.set(true);
        assert_eq!(runtime.step(), Err(Fault::CaptureShape { index: 1 }));
    }

    #[test]
    fn host_protocol_misuse_is_rejected() {
        let runtime = Runtime::new(|hooks| {
            let (_, set) = hooks.use_state(|| 0i32)?;
            Ok(set)
        });
        assert_eq!(runtime.step(), Err(Fault::NotInitialized));
        assert_eq!(runtime.finalize(), Err(Fault::NotInitialized));
        runtime.initialize().unwrap();
        assert_eq!(runtime.initialize(), Err(Fault::AlreadyInitialized));
        runtime.finalize().unwrap();
        assert_eq!(runtime.finalize(), Err(Fault::Finalized));
        assert_eq!(runtime.step(), Err(Fault::Finalized));
        assert_eq!(runtime.initialize(), Err(Fault::Finalized));
    }

    #[test]
    fn query_last_registration_wins() {
        #[derive(Debug, PartialEq)]
        enum Ping {
            Ask,
        }

        let runtime = Runtime::new(|hooks| {
            let (n, set_n) = hooks.use_state(|| 10i32)?;
            let first = *n;
            hooks.use_query(move |q| match q {
                Ping::Ask => Some(first),
            })?;
            let second = *n + 1;
            hooks.use_query(move |q| match q {
                Ping::Ask => Some(second),
            })?;
            Ok(set_n)
        });
        runtime.initialize().unwrap();
        assert_eq!(runtime.query::<Ping, i32>(Ping::Ask).unwrap(), Some(11));
        // a payload type nothing registered for answers nothing
        assert_eq!(runtime.query::<u8, u8>(3).unwrap(), None);
        runtime.finalize().unwrap();
        assert_eq!(runtime.query::<Ping, i32>(Ping::Ask), Err(Fault::Finalized));
    }

    #[test]
    fn query_without_handler_answers_nothing() {
        let runtime = Runtime::new(|hooks| {
            let (_, set) = hooks.use_state(|| 0i32)?;
            Ok(set)
        });
        runtime.initialize().unwrap();
        assert_eq!(runtime.query::<i32, i32>(1).unwrap(), None);
        runtime.finalize().unwrap();
    }

    #[test]
    fn previous_tracks_last_pass() {
        let runtime = Runtime::new(|hooks| {
            let (n, set_n) = hooks.use_state(|| 0i32)?;
            let previous = use_previous(hooks, *n)?;
            Ok((previous.map(|p| *p), set_n))
        });
        runtime.initialize().unwrap();
        assert_eq!(runtime.with_output(|(p, _)| *p), Some(None));

        let set = runtime.with_output(|(_, s)| s.clone()).unwrap();
        set.set(5).unwrap();
        assert_eq!(runtime.with_output(|(p, _)| *p), Some(Some(0)));
        set.set(7).unwrap();
        assert_eq!(runtime.with_output(|(p, _)| *p), Some(Some(5)));
        runtime.finalize().unwrap();
    }

    #[test]
    fn latest_mirror_keeps_one_handle_fresh() {
        let runtime = Runtime::new(|hooks| {
            let (n, set_n) = hooks.use_state(|| 0i32)?;
            let mirror = use_latest(hooks, *n)?;
            Ok((mirror, set_n))
        });
        runtime.initialize().unwrap();
        let mirror = runtime.with_output(|(m, _)| m.clone()).unwrap();
        assert_eq!(*mirror.borrow(), 0);

        let set = runtime.with_output(|(_, s)| s.clone()).unwrap();
        set.set(3).unwrap();
        // same handle across passes, refreshed in place
        assert_eq!(*mirror.borrow(), 3);
        runtime.finalize().unwrap();
    }

    #[test]
    fn dispose_runs_at_most_once() {
        let count = Rc::new(Cell::new(0));
        let count_in = count.clone();
        let dispose = Dispose::new(move || count_in.set(count_in.get() + 1));
        dispose.run();
        dispose.run();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn drop_without_finalize_runs_cleanups() {
        let cleaned = Rc::new(Cell::new(false));
        let cleaned_in = cleaned.clone();
        let runtime = Runtime::new(move |hooks| {
            let flag = cleaned_in.clone();
            hooks.use_mount_effect(move || Some(Dispose::new(move || flag.set(true))))?;
            Ok(())
        });
        runtime.initialize().unwrap();
        assert!(!cleaned.get());
        drop(runtime);
        assert!(cleaned.get());
    }
}
