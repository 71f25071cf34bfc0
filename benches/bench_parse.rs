use criterion::{Criterion, black_box, criterion_group, criterion_main};
use parsnip::analyze::check_files;
use parsnip::load_grammar;
use std::fs;
use tempfile::TempDir;

/// A module touching most of the grammar: decorators, async code, comprehensions,
/// f-strings, annotations, and the walrus operator.
fn make_python_file(index: usize) -> String {
    format!(
        r#"
"""Module {i}."""
from __future__ import annotations

import os
import sys
from collections import OrderedDict as OD

LIMIT_{i}: int = {i}

@property
def compute_{i}(a, b=2, *args, key=None, **kwargs):
    total = sum(x * y for x, y in zip(args, range(b)) if x)
    if (n := len(kwargs)) > LIMIT_{i}:
        return total, n
    while total > 0:
        total -= 1
        continue
    return [v for k, v in sorted(kwargs.items())]

class Worker_{i}(object, metaclass=type):
    def __init__(self, name: str) -> None:
        self.name = name
        self.cache = {{k: v for k, v in os.environ.items()}}

    async def run(self, items):
        async with self.lock as held:
            async for item in items:
                await item
        try:
            result = f"{{self.name!r:>10}} done"
        except (ValueError, KeyError) as exc:
            raise RuntimeError("failed") from exc
        finally:
            del held
        return result

data_{i} = OD(a=1, b=b"raw\x00bytes", c=0x_ff if False else 1_000)
print(*sys.argv[1:], sep="\n")
"#,
        i = index
    )
}

/// A module broken in several places so recovery paths run too.
fn make_broken_file(index: usize) -> String {
    format!(
        "def f_{index}(:\n    return 1\nx = (1 +\nclass C:\npass\n  y = 2\nprint(1 +)\n"
    )
}

fn bench_parse(c: &mut Criterion) {
    let grammar = load_grammar("3.8").unwrap();

    let source: String = (0..200).map(make_python_file).collect::<Vec<_>>().join("\n");
    c.bench_function("parse_large_valid_module", |b| {
        b.iter(|| {
            let module = grammar.parse(black_box(&source)).unwrap();
            black_box(module.diagnostics().len());
        });
    });

    let broken: String = (0..200).map(make_broken_file).collect();
    c.bench_function("parse_large_broken_module", |b| {
        b.iter(|| {
            let module = grammar.parse(black_box(&broken)).unwrap();
            black_box(module.diagnostics().len());
        });
    });

    let dir = TempDir::new().unwrap();
    let mut files = Vec::new();
    for i in 0..50 {
        let path = dir.path().join(format!("module_{i}.py"));
        fs::write(&path, make_python_file(i)).unwrap();
        files.push(path);
    }
    c.bench_function("check_files_50_modules", |b| {
        b.iter(|| black_box(check_files(black_box(&files), grammar)));
    });
}

criterion_group!(benches, bench_parse);
criterion_main!(benches);
