//! Property tests for reactive arrays.
//!
//! Any sequence of mutations leaves the array equal to a plain `Vec` that
//! saw the same operations, and an effect reading the array always holds
//! the latest contents.

use std::cell::RefCell;
use std::rc::Rc;

use alpen_reactive::{Effect, ReactiveArray, Value};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Push(i32),
    Pop,
    Shift,
    Unshift(i32),
    Set(usize, i32),
    Reverse,
    Splice(usize, usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..100i32).prop_map(Op::Push),
        Just(Op::Pop),
        Just(Op::Shift),
        (0..100i32).prop_map(Op::Unshift),
        (0..12usize, 0..100i32).prop_map(|(i, v)| Op::Set(i, v)),
        Just(Op::Reverse),
        (0..12usize, 0..4usize).prop_map(|(start, count)| Op::Splice(start, count)),
    ]
}

fn num(n: i32) -> Value {
    Value::Number(f64::from(n))
}

fn apply(array: &ReactiveArray, model: &mut Vec<Value>, op: &Op) {
    match *op {
        Op::Push(n) => {
            assert_eq!(array.push(num(n)), model.len() + 1);
            model.push(num(n));
        }
        Op::Pop => assert_eq!(array.pop(), model.pop()),
        Op::Shift => {
            let expected = (!model.is_empty()).then(|| model.remove(0));
            assert_eq!(array.shift(), expected);
        }
        Op::Unshift(n) => {
            model.insert(0, num(n));
            assert_eq!(array.unshift(num(n)), model.len());
        }
        Op::Set(index, n) => {
            array.set(index, num(n));
            if index >= model.len() {
                model.resize(index + 1, Value::Undefined);
            }
            model[index] = num(n);
        }
        Op::Reverse => {
            array.reverse();
            model.reverse();
        }
        Op::Splice(start, count) => {
            let start = start.min(model.len());
            let end = (start + count).min(model.len());
            let removed: Vec<Value> = model.drain(start..end).collect();
            assert_eq!(array.splice(start, count), removed);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn mutations_match_a_vec_model(
        initial in prop::collection::vec(0..100i32, 0..6),
        ops in prop::collection::vec(op(), 1..24),
    ) {
        let mut model: Vec<Value> = initial.iter().copied().map(num).collect();
        let array = ReactiveArray::new(model.clone());

        let seen = Rc::new(RefCell::new(Vec::new()));
        let _effect = {
            let array = array.clone();
            let seen = Rc::clone(&seen);
            Effect::new(move || *seen.borrow_mut() = array.to_vec())
        };

        for op in &ops {
            apply(&array, &mut model, op);
            prop_assert_eq!(&array.peek(), &model);
            prop_assert_eq!(&*seen.borrow(), &model, "after {:?}", op);
        }
    }
}
