use std::collections::HashMap;
use std::hint::black_box;
use std::path::{Path, PathBuf};

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use pasta_core::config::Config;
use pasta_core::error::UnitError;
use pasta_core::project::Project;
use pasta_core::syntax::ast::SyntaxTree;
use pasta_core::syntax::loader::TreeLoader;

#[path = "../tests/common/parser.rs"]
#[allow(dead_code)]
mod parser;

/// Pre-parsed trees so the timings cover the semantic passes only.
struct ParsedProject {
    paths: Vec<PathBuf>,
    trees: HashMap<PathBuf, SyntaxTree>,
}

impl TreeLoader for ParsedProject {
    fn load(&self, path: &Path) -> Result<SyntaxTree, UnitError> {
        self.trees.get(path).cloned().ok_or_else(|| UnitError::NotFound {
            path: path.to_path_buf(),
        })
    }
}

/// Unit `i` imports units `i / 2` and `i - 1`, giving waves that widen
/// as the project grows.
fn generate_unit(i: usize) -> String {
    let mut uses = Vec::new();
    if i > 0 {
        uses.push(format!("Unit{}", i - 1));
        if i / 2 != i - 1 {
            uses.push(format!("Unit{}", i / 2));
        }
    }
    let uses = if uses.is_empty() {
        String::new()
    } else {
        format!("uses {};", uses.join(", "))
    };
    let parent = if i == 0 {
        String::new()
    } else {
        format!("(TNode{})", i - 1)
    };
    let call = if i == 0 {
        "X".to_string()
    } else {
        format!("Step{}(X) + Step{}(X)", i - 1, i / 2)
    };

    format!(
        r#"unit Unit{i};
interface
{uses}
type
  TNode{i} = class{parent}
  private
    FValue{i}: Integer;
  public
    Name{i}: String;
    constructor Create;
    function Value{i}: Integer;
    procedure Put{i}(X: Integer); overload;
    procedure Put{i}(const S: String); overload;
  end;
function Step{i}(X: Integer): Integer;
implementation
constructor TNode{i}.Create;
begin
  inherited;
  FValue{i} := 0;
end;
function TNode{i}.Value{i}: Integer;
begin
  Result := FValue{i};
end;
procedure TNode{i}.Put{i}(X: Integer);
begin
  FValue{i} := X;
end;
procedure TNode{i}.Put{i}(const S: String);
begin
  Name{i} := S;
end;
function Step{i}(X: Integer): Integer;
var N: TNode{i};
    I: Integer;
begin
  N := TNode{i}.Create;
  for I := 0 to X do
  begin
    N.Put{i}(I);
    N.Put{i}('step');
  end;
  Result := {call} + N.Value{i};
end;
end.
"#
    )
}

fn generate_project(units: usize) -> ParsedProject {
    let mut paths = Vec::with_capacity(units);
    let mut trees = HashMap::with_capacity(units);
    for i in 0..units {
        let path = PathBuf::from(format!("Unit{i}.pas"));
        let tree = parser::parse(&path, &generate_unit(i));
        paths.push(path.clone());
        trees.insert(path, tree);
    }
    ParsedProject { paths, trees }
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    group.sample_size(20);

    for units in [10, 50, 200] {
        let project = generate_project(units);
        group.throughput(Throughput::Elements(units as u64));

        let parallel = Project::new(Config::default());
        group.bench_with_input(BenchmarkId::new("parallel", units), &project, |b, p| {
            b.iter(|| parallel.build(black_box(&p.paths), p))
        });

        let mut config = Config::default();
        config.build.parallel = false;
        let sequential = Project::new(config);
        group.bench_with_input(BenchmarkId::new("sequential", units), &project, |b, p| {
            b.iter(|| sequential.build(black_box(&p.paths), p))
        });
    }

    group.finish();
}

fn bench_reassociate(c: &mut Criterion) {
    let mut group = c.benchmark_group("reassociate");

    let project = generate_project(50);
    let outcome = Project::new(Config::default()).build(&project.paths, &project);
    assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);

    let tree = &project.trees[Path::new("Unit49.pas")];
    group.bench_function("single_unit", |b| {
        b.iter(|| outcome.table.reassociate(black_box(tree)))
    });

    group.bench_function("whole_project", |b| {
        b.iter(|| {
            for path in &project.paths {
                let _ = black_box(outcome.table.reassociate(&project.trees[path]));
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_build, bench_reassociate);
criterion_main!(benches);
