use crawlmap_driver::{ClickEffect, Driver, ScriptedSite};
use crawlmap_explore::{
    backtrack, BacktrackOutcome, CrawlConfig, CrawlContext, CrawlEvent, Crawler, MemoryArchive,
    MemoryDataBank, RecordingSink, Systematic, Tactic, TimeBudget,
};
use crawlmap_markup::{FramePath, HtmlAnalyzer};
use crawlmap_model::{EdgeDraft, MarkupFragment, Observation};

const BASE: &str = "http://app.test/";

fn context(site: &ScriptedSite) -> (CrawlContext, RecordingSink, MemoryArchive) {
    let sink = RecordingSink::new();
    let archive = MemoryArchive::new();
    let sessions: Vec<Box<dyn Driver>> = vec![Box::new(site.session())];
    let ctx = CrawlContext::new(
        CrawlConfig::for_url(BASE),
        sessions,
        Box::new(HtmlAnalyzer::default()),
        Box::new(MemoryDataBank::new()),
    )
    .unwrap()
    .with_sink(Box::new(sink.clone()))
    .with_archive(Box::new(archive.clone()));
    (ctx, sink, archive)
}

/// home -a-> A -x-> outside, with both history tactics broken.
fn stubborn_site() -> ScriptedSite {
    ScriptedSite::new()
        .page(
            "home",
            BASE,
            r#"<html><body><a id="a" href="/a">A</a></body></html>"#,
        )
        .page(
            "a",
            "http://app.test/a",
            r#"<html><body><h1>A</h1><a id="x" href="http://elsewhere.test/">X</a></body></html>"#,
        )
        .page(
            "outside",
            "http://elsewhere.test/",
            "<html><body>Somewhere else</body></html>",
        )
        .on_click("home", "a", ClickEffect::Navigate("a".to_string()))
        .on_click("a", "x", ClickEffect::Navigate("outside".to_string()))
        .without_history_back()
        .without_script_back()
}

fn tried(events: &[CrawlEvent]) -> Vec<(Tactic, bool)> {
    events
        .iter()
        .filter_map(|e| match e {
            CrawlEvent::TacticTried {
                tactic, restored, ..
            } => Some((*tactic, *restored)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_replay_from_base_restores_after_cheap_tactics_fail() {
    let site = stubborn_site();
    let (ctx, sink, _archive) = context(&site);
    let mut crawler = Crawler::new(ctx, Box::new(Systematic::new())).unwrap();
    let report = crawler.run().unwrap();

    assert_eq!(report.states, 2);
    assert_eq!(report.excursions, 1);

    let events = sink.events();
    // The URL never matched, so no refresh was attempted.
    assert_eq!(
        tried(&events),
        vec![
            (Tactic::HistoryBack, false),
            (Tactic::ScriptBack, false),
            (Tactic::ForwardReplay, false),
            (Tactic::ReplayFromBase, true),
        ]
    );
    assert!(events.contains(&CrawlEvent::Backtracked {
        target: 1,
        outcome: BacktrackOutcome::Restored(Tactic::ReplayFromBase),
    }));
    let stats = site.stats();
    assert_eq!(stats.refreshes, 0);
    assert_eq!(stats.restarts, 0);
    // Initial load plus the reload of the base URL.
    assert_eq!(stats.navigations, 2);
}

fn ghost_target(ctx: &mut CrawlContext) -> u32 {
    ctx.start_sessions().unwrap();
    let home = ctx.observe(0).unwrap();
    let (home_id, _) = ctx.graph.set_initial(home, ctx.analyzer.as_ref());

    // A state the site never shows, recorded as reached through link "a".
    let ghost = Observation::new(
        "http://app.test/ghost",
        vec![MarkupFragment::top(
            "http://app.test/ghost",
            "<html><body>Ghost</body></html>",
        )],
        ctx.analyzer.as_ref(),
    );
    let (ghost_id, is_new) = ctx.graph.add_state(ghost, 1, ctx.analyzer.as_ref());
    assert!(is_new);
    let link = ctx.graph.state(home_id).unwrap().clickables()[&FramePath::top()][0].clone();
    ctx.graph
        .add_edge(EdgeDraft::new(home_id, link, FramePath::top()), ghost_id)
        .unwrap();
    ghost_id
}

#[test]
fn test_unreachable_target_exhausts_every_tactic() {
    let site = stubborn_site();
    let (mut ctx, sink, archive) = context(&site);
    let ghost = ghost_target(&mut ctx);

    let outcome = backtrack(&mut ctx, ghost);
    assert_eq!(outcome, BacktrackOutcome::Exhausted);
    assert_eq!(ctx.graph.current(), Some(0));

    let events = sink.events();
    let tactics: Vec<Tactic> = tried(&events).into_iter().map(|(t, _)| t).collect();
    // No action history yet, so forward replay is skipped.
    assert_eq!(
        tactics,
        vec![
            Tactic::HistoryBack,
            Tactic::ScriptBack,
            Tactic::ReplayFromBase,
            Tactic::RestartReplay,
        ]
    );
    assert!(events.contains(&CrawlEvent::ReplayMismatch {
        target: ghost,
        step: 0,
        expected: ghost,
    }));
    assert_eq!(
        archive.log().mismatches,
        vec![(
            ghost,
            0,
            "http://app.test/ghost".to_string(),
            "http://app.test/a".to_string()
        )]
    );
    assert_eq!(site.stats().restarts, 1);
}

#[test]
fn test_refresh_restores_a_script_rewrite() {
    let site = ScriptedSite::new()
        .page(
            "home",
            BASE,
            r#"<html><body><button id="swap">Swap</button></body></html>"#,
        )
        .page("swapped", BASE, "<html><body>Swapped</body></html>")
        .on_click("home", "swap", ClickEffect::Rewrite("swapped".to_string()));
    let (mut ctx, sink, _archive) = context(&site);
    ctx.start_sessions().unwrap();
    let home = ctx.observe(0).unwrap();
    let (home_id, _) = ctx.graph.set_initial(home, ctx.analyzer.as_ref());

    let link = ctx.graph.state(home_id).unwrap().clickables()[&FramePath::top()][0].clone();
    ctx.fire(&EdgeDraft::new(home_id, link, FramePath::top()));
    let expected = ctx.graph.state(home_id).unwrap().observation().clone();
    assert!(!ctx.shows(&expected));

    let outcome = backtrack(&mut ctx, home_id);
    assert_eq!(outcome, BacktrackOutcome::Restored(Tactic::Refresh));
    assert_eq!(tried(&sink.events()), vec![(Tactic::Refresh, true)]);
    assert_eq!(site.stats().refreshes, 1);
    assert_eq!(site.stats().history_backs, 0);
}

#[test]
fn test_spent_budget_times_out_before_any_tactic() {
    let site = stubborn_site();
    let (ctx, sink, _archive) = context(&site);
    let mut ctx = ctx.with_budget(TimeBudget::spent());
    ctx.start_sessions().unwrap();
    let home = ctx.observe(0).unwrap();
    let (home_id, _) = ctx.graph.set_initial(home, ctx.analyzer.as_ref());

    assert_eq!(backtrack(&mut ctx, home_id), BacktrackOutcome::TimedOut);
    let events = sink.events();
    assert!(tried(&events).is_empty());
    assert!(events.contains(&CrawlEvent::Backtracked {
        target: home_id,
        outcome: BacktrackOutcome::TimedOut,
    }));
}
