mod common;

use alpen_runtime::{ErrorKind, ReconciliationError, RuntimeError};
use common::{all, by_id, click, drain_diagnostics, one, page, run, text, texts};

#[test]
fn appending_keeps_the_first_row_instance() {
    let rt = page(
        r#"
        <div x-data="{ items: ['foo'] }">
            <button x-on:click="items = ['foo', 'bar']">click me</button>
            <template x-for="item in items">
                <span x-text="item"></span>
            </template>
        </div>
        "#,
    );
    assert_eq!(texts(&rt, "span"), ["foo"]);
    let first = all(&rt, "span")[0];

    click(&rt, one(&rt, "button"));
    assert_eq!(texts(&rt, "span"), ["foo", "bar"]);
    assert_eq!(all(&rt, "span")[0], first);
}

#[test]
fn empty_array_removes_every_row() {
    for initial in ["['foo']", "['foo', 'bar', 'world']"] {
        let rt = page(&format!(
            r#"
            <div x-data="{{ items: {initial} }}">
                <button x-on:click="items = []">click me</button>
                <template x-for="item in items" :key="item">
                    <span x-text="item"></span>
                </template>
            </div>
            "#
        ));
        let rows = all(&rt, "span");
        assert!(!rows.is_empty());

        click(&rt, one(&rt, "button"));
        assert!(all(&rt, "span").is_empty());
        let doc = rt.document();
        assert!(rows.iter().all(|&row| !doc.is_connected(row)));
    }
}

#[test]
fn elements_inside_rows_are_reactive() {
    let rt = page(
        r#"
        <div x-data="{ items: ['first'], foo: 'bar' }">
            <button x-on:click="foo = 'baz'">click me</button>
            <template x-for="item in items">
                <span>
                    <h1 x-text="item"></h1>
                    <h2 x-text="foo"></h2>
                </span>
            </template>
        </div>
        "#,
    );
    assert_eq!(texts(&rt, "h1"), ["first"]);
    assert_eq!(texts(&rt, "h2"), ["bar"]);

    click(&rt, one(&rt, "button"));
    assert_eq!(texts(&rt, "h1"), ["first"]);
    assert_eq!(texts(&rt, "h2"), ["baz"]);
}

#[test]
fn components_inside_rows_are_reactive() {
    for markup in [
        r#"
        <div x-data="{ items: ['first'] }">
            <template x-for="item in items">
                <div x-data="{foo: 'bar'}" class="child">
                    <span x-text="foo"></span>
                    <button x-on:click="foo = 'bob'">click me</button>
                </div>
            </template>
        </div>
        "#,
        r#"
        <div x-data="{ items: ['first'] }">
            <template x-for="item in items">
                <ul>
                    <div x-data="{foo: 'bar'}" class="child">
                        <span x-text="foo"></span>
                        <button x-on:click="foo = 'bob'">click me</button>
                    </div>
                </ul>
            </template>
        </div>
        "#,
    ] {
        let rt = page(markup);
        assert_eq!(texts(&rt, "span"), ["bar"]);
        click(&rt, one(&rt, "button"));
        assert_eq!(texts(&rt, "span"), ["bob"]);
    }
}

#[test]
fn keyed_reorder_moves_nodes() {
    let rt = page(
        r#"
        <div x-data="{ items: ['foo', 'bar'] }">
            <button x-on:click="items = ['bar', 'foo', 'baz']" id="reorder">click me</button>
            <template x-for="item in items" :key="item">
                <span x-text="item"></span>
            </template>
        </div>
        "#,
    );
    let before = all(&rt, "span");
    {
        let mut doc = rt.document_mut();
        for (i, &row) in before.iter().enumerate() {
            doc.set_property(row, "og_loop_index", i.to_string());
        }
    }

    click(&rt, by_id(&rt, "reorder"));
    let after = all(&rt, "span");
    assert_eq!(texts(&rt, "span"), ["bar", "foo", "baz"]);
    assert_eq!(after[0], before[1]);
    assert_eq!(after[1], before[0]);
    let doc = rt.document();
    assert_eq!(doc.property(after[0], "og_loop_index"), Some("1"));
    assert_eq!(doc.property(after[1], "og_loop_index"), Some("0"));
    assert_eq!(doc.property(after[2], "og_loop_index"), None);
}

#[test]
fn keying_by_index_reuses_positions() {
    let rt = page(
        r#"
        <div x-data="{ items: ['foo', 'bar'] }">
            <button x-on:click="items = ['bar', 'foo', 'baz']" id="reorder">click me</button>
            <template x-for="(item, index) in items" :key="index">
                <span x-text="item"></span>
            </template>
        </div>
        "#,
    );
    let before = all(&rt, "span");

    click(&rt, by_id(&rt, "reorder"));
    let after = all(&rt, "span");
    assert_eq!(texts(&rt, "span"), ["bar", "foo", "baz"]);
    assert_eq!(&after[..2], &before[..]);
}

#[test]
fn index_and_collection_are_bound() {
    let rt = page(
        r#"
        <div x-data="{ items: ['foo'] }">
            <template x-for="(item, index, things) in items">
                <div>
                    <h1 x-text="items.indexOf(item)"></h1>
                    <h2 x-text="index"></h2>
                    <h3 x-text="things"></h3>
                </div>
            </template>
        </div>
        "#,
    );
    assert_eq!(texts(&rt, "h1"), ["0"]);
    assert_eq!(texts(&rt, "h2"), ["0"]);
    assert_eq!(texts(&rt, "h3"), ["foo"]);
}

#[test]
fn listeners_see_fresh_iteration_data() {
    let rt = page(
        r#"
        <div x-data="{ items: ['foo'], output: '' }">
            <button x-on:click="items = ['bar']">click me</button>
            <template x-for="(item, index) in items">
                <span x-text="item" x-on:click="output = item"></span>
            </template>
            <h1 x-text="output"></h1>
        </div>
        "#,
    );
    assert_eq!(texts(&rt, "h1"), [""]);
    let span = one(&rt, "span");
    click(&rt, span);
    assert_eq!(texts(&rt, "h1"), ["foo"]);

    click(&rt, one(&rt, "button"));
    assert_eq!(one(&rt, "span"), span);
    assert_eq!(rt.listener_count(span), 1);
    click(&rt, span);
    assert_eq!(texts(&rt, "h1"), ["bar"]);
}

#[test]
fn nested_loops_add_an_outer_row() {
    let rt = page(
        r#"
        <div x-data="{ foos: [ {bars: ['bob', 'lob']} ] }">
            <button x-on:click="foos = [ {bars: ['bob', 'lob']}, {bars: ['law']} ]">click me</button>
            <template x-for="foo in foos">
                <h1>
                    <template x-for="bar in foo.bars">
                        <h2 x-text="bar"></h2>
                    </template>
                </h1>
            </template>
        </div>
        "#,
    );
    assert_eq!(all(&rt, "h1").len(), 1);
    let inner_before = all(&rt, "h2");
    assert_eq!(texts(&rt, "h2"), ["bob", "lob"]);

    click(&rt, one(&rt, "button"));
    let outer = all(&rt, "h1");
    assert_eq!(outer.len(), 2);
    assert_eq!(texts(&rt, "h2"), ["bob", "lob", "law"]);
    assert_eq!(&all(&rt, "h2")[..2], &inner_before[..]);

    let doc = rt.document();
    let second_rows: Vec<_> = doc
        .element_children(outer[1])
        .into_iter()
        .filter(|&n| doc.tag(n) == Some("h2"))
        .collect();
    assert_eq!(second_rows.len(), 1);
}

#[test]
fn inserting_at_the_beginning_with_keys() {
    let rt = page(
        r#"
        <div x-data="{ items: [{name: 'one', key: '1'}, {name: 'two', key: '2'}] }">
            <button x-on:click="items = [{name: 'zero', key: '0'}, {name: 'one', key: '1'}, {name: 'two', key: '2'}]">click me</button>
            <template x-for="item in items" :key="item.key">
                <span x-text="item.name"></span>
            </template>
        </div>
        "#,
    );
    let before = all(&rt, "span");
    assert_eq!(texts(&rt, "span"), ["one", "two"]);

    click(&rt, one(&rt, "button"));
    assert_eq!(texts(&rt, "span"), ["zero", "one", "two"]);
    assert_eq!(&all(&rt, "span")[1..], &before[..]);
}

#[test]
fn nested_loops_read_the_outer_variable() {
    let rt = page(
        r#"
        <div x-data="{ foos: [ {name: 'foo', bars: ['bob', 'lob']}, {name: 'baz', bars: ['bab', 'lab']} ] }">
            <template x-for="foo in foos">
                <h1>
                    <template x-for="bar in foo.bars">
                        <h2 x-text="foo.name+': '+bar"></h2>
                    </template>
                </h1>
            </template>
        </div>
        "#,
    );
    assert_eq!(texts(&rt, "h2"), ["foo: bob", "foo: lob", "baz: bab", "baz: lab"]);
}

#[test]
fn sibling_loops_are_independent() {
    let rt = page(
        r#"
        <div x-data="{ foos: [1], bars: [1, 2] }">
            <template x-for="foo in foos">
                <h1 x-text="foo"></h1>
            </template>
            <template x-for="bar in bars">
                <h2 x-text="bar"></h2>
            </template>
            <button @click="foos = [1, 2];bars = [1, 2, 3]">Change</button>
        </div>
        "#,
    );
    assert_eq!(texts(&rt, "h1"), ["1"]);
    assert_eq!(texts(&rt, "h2"), ["1", "2"]);

    click(&rt, one(&rt, "button"));
    assert_eq!(texts(&rt, "h1"), ["1", "2"]);
    assert_eq!(texts(&rt, "h2"), ["1", "2", "3"]);

    // Each loop's rows stay directly after their own template.
    let doc = rt.document();
    let container = doc.parent(one(&rt, "button")).unwrap();
    let tags: Vec<_> = doc
        .element_children(container)
        .into_iter()
        .map(|n| doc.tag(n).unwrap_or_default().to_string())
        .collect();
    assert_eq!(tags, ["template", "h1", "h1", "template", "h2", "h2", "h2", "button"]);
}

#[test]
fn range_loops() {
    let rt = page(
        r#"
        <div x-data>
            <template x-for="i in 10">
                <span x-text="i"></span>
            </template>
        </div>
        "#,
    );
    let expected: Vec<String> = (1..=10).map(|i| i.to_string()).collect();
    assert_eq!(texts(&rt, "span"), expected);

    let rt = page(
        r#"
        <div x-data="{ count: 10 }">
            <template x-for="i in count">
                <span x-text="i"></span>
            </template>
        </div>
        "#,
    );
    assert_eq!(all(&rt, "span").len(), 10);
    run(&rt, one(&rt, "div"), "count = 3");
    assert_eq!(texts(&rt, "span"), ["1", "2", "3"]);
}

#[test]
fn oversized_ranges_report_and_render_nothing() {
    let _ = drain_diagnostics();
    let rt = page(
        r#"
        <div x-data="{ count: 3 }">
            <template x-for="i in count">
                <span x-text="i"></span>
            </template>
        </div>
        "#,
    );
    assert_eq!(texts(&rt, "span"), ["1", "2", "3"]);

    run(&rt, one(&rt, "div"), "count = 1000000 * 1000000000");
    assert!(all(&rt, "span").is_empty());
    let reported = drain_diagnostics();
    assert!(reported.iter().any(|d| matches!(
        &d.error,
        RuntimeError::Directive { message, .. } if message.contains("exceeds the limit")
    )));

    run(&rt, one(&rt, "div"), "count = 2");
    assert_eq!(texts(&rt, "span"), ["1", "2"]);
}

#[test]
fn pushing_onto_an_empty_array() {
    let rt = page(
        r#"
        <div x-data="{ items: [] }">
            <template x-for="i in items">
                <span x-text="i"></span>
            </template>
            <button @click="items.push(2)" id="first">click me</button>
            <button @click="items.push(3)" id="second">click me</button>
        </div>
        "#,
    );
    assert!(all(&rt, "span").is_empty());
    click(&rt, by_id(&rt, "first"));
    assert_eq!(texts(&rt, "span"), ["2"]);
    click(&rt, by_id(&rt, "second"));
    assert_eq!(texts(&rt, "span"), ["2", "3"]);
}

#[test]
fn iterating_an_object() {
    let rt = page(
        r#"
        <div x-data="{ colors: { red: '#f00', green: '#0f0' } }">
            <template x-for="(value, name) in colors">
                <span x-text="name + '=' + value"></span>
            </template>
        </div>
        "#,
    );
    assert_eq!(texts(&rt, "span"), ["red=#f00", "green=#0f0"]);
    run(&rt, one(&rt, "div"), "colors.blue = '#00f'");
    assert_eq!(texts(&rt, "span"), ["red=#f00", "green=#0f0", "blue=#00f"]);
}

#[test]
fn removed_rows_stop_reacting() {
    let rt = page(
        r#"
        <div x-data="{ items: ['a', 'b'], suffix: '!' }">
            <template x-for="item in items" :key="item">
                <span x-text="item + suffix"></span>
            </template>
        </div>
        "#,
    );
    let container = one(&rt, "div");
    let rows = all(&rt, "span");
    let doomed = rows[1];
    let doomed_scope = rt.scope_of(doomed).unwrap();

    run(&rt, container, "items = ['a']");
    assert!(!rt.document().is_connected(doomed));
    assert!(!rt.is_scope_alive(doomed_scope));
    assert_eq!(rt.effect_count(doomed), 0);

    run(&rt, container, "suffix = '?'");
    assert_eq!(texts(&rt, "span"), ["a?"]);
    assert_eq!(text(&rt, doomed), "b!");
}

#[test]
fn duplicate_keys_keep_the_first_occurrence() {
    let _ = drain_diagnostics();
    let rt = page(
        r#"
        <div x-data="{ items: ['a', 'b', 'a'] }">
            <template x-for="item in items" :key="item">
                <span x-text="item"></span>
            </template>
        </div>
        "#,
    );
    assert_eq!(texts(&rt, "span"), ["a", "b"]);
    let reported = drain_diagnostics();
    assert!(reported.iter().any(|d| matches!(
        &d.error,
        RuntimeError::Reconciliation(ReconciliationError::DuplicateKey { key, .. }) if key == "a"
    )));
}

#[test]
fn externally_removed_row_is_recreated() {
    let _ = drain_diagnostics();
    let rt = page(
        r#"
        <div x-data="{ items: ['a', 'b'] }">
            <template x-for="item in items" :key="item">
                <span x-text="item"></span>
            </template>
        </div>
        "#,
    );
    let container = one(&rt, "div");
    let stolen = all(&rt, "span")[0];
    rt.document_mut().remove(stolen);
    rt.tick();

    run(&rt, container, "items = ['b', 'a']");
    assert_eq!(texts(&rt, "span"), ["b", "a"]);
    assert_ne!(all(&rt, "span")[1], stolen);
    let reported = drain_diagnostics();
    assert!(reported.iter().any(|d| matches!(
        &d.error,
        RuntimeError::Reconciliation(ReconciliationError::DisposedEntry { key, .. }) if key == "a"
    )));
}

#[test]
fn invalid_loops_report_and_render_nothing() {
    let _ = drain_diagnostics();
    let rt = page(
        r#"
        <div x-data="{ flag: true }">
            <template x-for="item in flag">
                <span x-text="item"></span>
            </template>
            <div x-for="item in [1]"><p></p></div>
            <template x-for="nonsense">
                <i></i>
            </template>
        </div>
        "#,
    );
    assert!(all(&rt, "span").is_empty());
    assert!(all(&rt, "i").is_empty());
    let reported = drain_diagnostics();
    let directive_errors = reported
        .iter()
        .filter(|d| d.error.kind() == ErrorKind::Directive)
        .count();
    assert_eq!(directive_errors, 3);
}

#[test]
fn removing_the_template_removes_its_rows() {
    let rt = page(
        r#"
        <div x-data="{ items: [1, 2] }">
            <template x-for="item in items">
                <span x-text="item"></span>
            </template>
        </div>
        "#,
    );
    let template = {
        let doc = rt.document();
        doc.query_tag(doc.body(), "template")[0]
    };
    assert_eq!(all(&rt, "span").len(), 2);
    rt.document_mut().remove(template);
    rt.tick();
    assert!(all(&rt, "span").is_empty());
}
