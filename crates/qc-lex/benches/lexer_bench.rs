use criterion::{black_box, criterion_group, criterion_main, Criterion};

use qc_lex::source::load_program;
use qc_lex::token::id;
use qc_lex::scan;

const PROGRAM: &str = r#"
/* token soup for throughput measurement */
int total;

int accumulate(int n)
{
        int i, s;
        s = 0;
        for (i = 1; i <= n; i = i + 1)
                s += i * 2 - (i >> 1);
        return s;
}

int main(void)
{
        int x;
        x = accumulate(100);
        while (x > 0)
                x = x - 7;
        printf("%d\n", x);
        return 0;
}
"#;

fn bench_scan_program(c: &mut Criterion) {
    let prog = load_program(PROGRAM).unwrap();
    c.bench_function("scan_program", |b| {
        b.iter(|| {
            let mut pos = 0;
            let mut count = 0usize;
            loop {
                let s = scan(&prog.text, &prog.strings, pos).unwrap();
                if s.tok.id() == id::FINISHED {
                    break;
                }
                pos = s.pos;
                count += 1;
            }
            black_box(count)
        })
    });
}

criterion_group!(benches, bench_scan_program);
criterion_main!(benches);
